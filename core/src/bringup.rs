//! Bring-up orchestration
//!
//! [`Bringup`] owns the bus adapter, the chip driver once attached, the
//! identity resolver and the canonical [`NetworkInfo`]. [`Bringup::run`]
//! sequences the stages and stops at the first failure.

use embedded_hal::delay::DelayNs as SpinDelay;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use wiz_hal::{BusAdapter, Clock, NetworkInfo};

use crate::addr::parse_mac;
use crate::bus::{BusSession, SessionBusy};
use crate::chip::{self, Attach};
use crate::config::{BringupConfig, DEFAULT_MAC};
use crate::error::BringupError;
use crate::fmt::Debug2Format;
use crate::identity::Resolve;
use crate::socket;
use crate::VERSION;

/// Board resources the pipeline drives
pub struct Platform<P, S, Y, K> {
    /// Chip reset line
    pub reset: P,
    /// Busy-wait delay for the reset pulse
    pub spin: S,
    /// Yielding delay for poll intervals
    pub delay: Y,
    pub clock: K,
}

/// Bring-up context
pub struct Bringup<B, C, R> {
    config: BringupConfig,
    resolver: R,
    info: NetworkInfo,
    ready: bool,
    bus: Option<B>,
    chip: Option<C>,
}

impl<B, C, R> Bringup<B, C, R>
where
    B: BusAdapter,
    C: Attach<B>,
    R: Resolve<C>,
{
    /// The MAC starts out as [`DEFAULT_MAC`].
    pub fn new(bus: B, resolver: R, config: BringupConfig) -> Self {
        Self {
            config,
            resolver,
            info: NetworkInfo::with_mac(DEFAULT_MAC),
            ready: false,
            bus: Some(bus),
            chip: None,
        }
    }

    /// Run the whole pipeline.
    ///
    /// Readiness is cleared on entry and set only when every stage
    /// succeeds.
    pub async fn run<P, S, Y, K>(
        &mut self,
        platform: &mut Platform<P, S, Y, K>,
    ) -> Result<(), BringupError>
    where
        P: OutputPin,
        S: SpinDelay,
        Y: DelayNs,
        K: Clock,
    {
        self.ready = false;
        match self.pipeline(platform).await {
            Ok(()) => {
                self.ready = true;
                info!(
                    "Network ready (wiz-core v{=str}, {})",
                    VERSION,
                    self.resolver.mode()
                );
                Ok(())
            }
            Err(e) => {
                error!("Network bring-up failed (wiz-core v{=str}): {}", VERSION, e);
                Err(e)
            }
        }
    }

    async fn pipeline<P, S, Y, K>(
        &mut self,
        platform: &mut Platform<P, S, Y, K>,
    ) -> Result<(), BringupError>
    where
        P: OutputPin,
        S: SpinDelay,
        Y: DelayNs,
        K: Clock,
    {
        let Self {
            config,
            resolver,
            info,
            bus,
            chip,
            ..
        } = self;

        if chip.is_none() {
            let adapter = bus.take().ok_or(BringupError::BusInit)?;
            match BusSession::register(adapter) {
                Ok(session) => *chip = Some(C::attach(session)),
                Err(SessionBusy(adapter)) => {
                    *bus = Some(adapter);
                    return Err(BringupError::BusInit);
                }
            }
        }
        let chip = chip.as_mut().ok_or(BringupError::BusInit)?;

        chip::hardware_reset(&mut platform.reset, &mut platform.spin, &config.reset)?;
        chip::configure(chip, &config.partition)?;
        chip::wait_for_link(chip, &platform.clock, &mut platform.delay, &config.link).await?;

        resolver
            .resolve(chip, info, &platform.clock, &mut platform.delay)
            .await?;

        socket::init_pool(chip, &config.sockets);
        Ok(())
    }

    /// Replace the MAC used by the next run.
    ///
    /// Once bring-up has completed the string is not parsed; the resolved
    /// MAC is pushed to the chip again instead.
    pub fn set_mac(&mut self, mac: &str) -> Result<(), BringupError> {
        if !self.ready {
            self.info.mac = parse_mac(mac)?;
            debug!("Pending MAC {}", self.info.mac);
            return Ok(());
        }

        let chip = self.chip.as_mut().ok_or(BringupError::BusInit)?;
        chip.set_source_mac(&self.info.mac).map_err(|e| {
            error!("MAC refresh failed: {}", Debug2Format(&e));
            BringupError::Bus
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Identity resolved by the last run, or the pending one before that
    pub fn network_info(&self) -> NetworkInfo {
        self.info
    }

    /// Attached chip driver, once the bus has been registered
    pub fn chip_mut(&mut self) -> Option<&mut C> {
        self.chip.as_mut()
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }
}
