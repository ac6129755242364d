//! Network identity resolution
//!
//! The resolver is picked at build time through the `R` parameter of
//! [`Bringup`](crate::Bringup): [`StaticResolver`] commits fixed addresses,
//! [`DhcpResolver`] negotiates a lease with a bounded timeout.

use core::future::Future;

use embedded_hal_async::delay::DelayNs;
use wiz_hal::{
    AddressMode, ChipControl, Clock, DhcpEngine, DhcpListener, DhcpStatus, Duration, Lease,
    NetworkInfo,
};

use crate::addr::parse_ipv4;
use crate::config::{DhcpConfig, StaticConfig};
use crate::error::BringupError;
use crate::fmt::Debug2Format;

/// Fills in and commits a [`NetworkInfo`]
///
/// `info` arrives carrying the MAC to use. On success it holds the
/// committed identity; on failure no half-resolved addresses are left in
/// it or on the chip.
pub trait Resolve<C: ChipControl> {
    fn resolve<K: Clock, Y: DelayNs>(
        &mut self,
        chip: &mut C,
        info: &mut NetworkInfo,
        clock: &K,
        delay: &mut Y,
    ) -> impl Future<Output = Result<(), BringupError>>;

    /// Address mode this resolver produces
    fn mode(&self) -> AddressMode;
}

fn commit<C: ChipControl>(chip: &mut C, info: &NetworkInfo) -> Result<(), BringupError> {
    chip.set_network_info(info).map_err(|e| {
        error!("Committing network info failed: {}", Debug2Format(&e));
        BringupError::Bus
    })
}

/// Fixed addresses from build-time configuration
pub struct StaticResolver {
    config: StaticConfig,
}

impl StaticResolver {
    pub const fn new(config: StaticConfig) -> Self {
        Self { config }
    }
}

impl<C: ChipControl> Resolve<C> for StaticResolver {
    async fn resolve<K: Clock, Y: DelayNs>(
        &mut self,
        chip: &mut C,
        info: &mut NetworkInfo,
        _clock: &K,
        _delay: &mut Y,
    ) -> Result<(), BringupError> {
        // Nothing is committed unless all three parse
        let ip = parse_ipv4(self.config.ip)?;
        let subnet_mask = parse_ipv4(self.config.subnet_mask)?;
        let gateway = parse_ipv4(self.config.gateway)?;

        info.ip = ip;
        info.subnet_mask = subnet_mask;
        info.gateway = gateway;
        info.mode = AddressMode::Static;
        commit(chip, info)?;

        *info = chip.network_info().map_err(|e| {
            error!("Reading back network info failed: {}", Debug2Format(&e));
            BringupError::Bus
        })?;
        info!("Static address {}", info.ip);
        Ok(())
    }

    fn mode(&self) -> AddressMode {
        AddressMode::Static
    }
}

/// DHCP negotiation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhcpPhase {
    Idle,
    Negotiating,
    Leased,
    Failed,
    TimedOut,
    /// Another host holds the offered address
    Conflict,
}

/// Events raised by the engine during one step
#[derive(Default)]
struct StepEvents {
    lease: Option<Lease>,
    conflict: bool,
}

impl DhcpListener for StepEvents {
    fn on_assign(&mut self, lease: &Lease) {
        self.lease = Some(*lease);
    }

    fn on_change(&mut self, lease: &Lease) {
        self.lease = Some(*lease);
    }

    fn on_conflict(&mut self) {
        self.conflict = true;
    }
}

fn apply_lease(info: &mut NetworkInfo, lease: &Lease) {
    info.ip = lease.ip;
    info.gateway = lease.gateway;
    info.subnet_mask = lease.subnet_mask;
    info.dns = lease.dns;
    info.mode = AddressMode::Dhcp;
}

/// Lease negotiation driven by a [`DhcpEngine`]
pub struct DhcpResolver<D> {
    engine: D,
    config: DhcpConfig,
    phase: DhcpPhase,
}

impl<D> DhcpResolver<D> {
    pub const fn new(engine: D, config: DhcpConfig) -> Self {
        Self {
            engine,
            config,
            phase: DhcpPhase::Idle,
        }
    }

    pub fn phase(&self) -> DhcpPhase {
        self.phase
    }

    pub fn engine(&self) -> &D {
        &self.engine
    }

    fn enter(&mut self, phase: DhcpPhase) {
        info!("DHCP phase: {}", phase);
        self.phase = phase;
    }

    /// Stop the engine and put the zeroed identity back, on the chip too.
    fn abandon<C>(
        &mut self,
        chip: &mut C,
        info: &mut NetworkInfo,
        phase: DhcpPhase,
        error: BringupError,
    ) -> BringupError
    where
        C: ChipControl,
        D: DhcpEngine<C>,
    {
        self.engine.stop(chip);
        *info = NetworkInfo::with_mac(info.mac);
        if commit(chip, info).is_err() {
            warn!("Chip may still hold a transient lease");
        }
        self.enter(phase);
        error
    }
}

impl<C, D> Resolve<C> for DhcpResolver<D>
where
    C: ChipControl,
    D: DhcpEngine<C>,
{
    async fn resolve<K: Clock, Y: DelayNs>(
        &mut self,
        chip: &mut C,
        info: &mut NetworkInfo,
        clock: &K,
        delay: &mut Y,
    ) -> Result<(), BringupError> {
        let socket = self.config.socket;
        let kib = self.config.buffer_kib;
        chip.set_socket_buffers(socket, kib, kib)
            .and_then(|()| chip.set_source_mac(&info.mac))
            .map_err(|e| {
                error!("DHCP socket setup failed: {}", Debug2Format(&e));
                BringupError::Bus
            })?;

        *info = NetworkInfo::with_mac(info.mac);
        commit(chip, info)?;

        self.engine.configure(socket, info.mac);
        self.enter(DhcpPhase::Negotiating);

        let start = clock.now();
        let interval_ms = u32::try_from(self.config.poll.interval.to_millis()).unwrap_or(u32::MAX);

        loop {
            let now = clock.now();
            let elapsed = now
                .checked_duration_since(start)
                .unwrap_or(Duration::millis(0));
            if elapsed >= self.config.poll.timeout {
                return Err(self.abandon(chip, info, DhcpPhase::TimedOut, BringupError::DhcpTimeout));
            }

            let mut events = StepEvents::default();
            let status = self.engine.step(chip, now, &mut events);

            if events.conflict {
                return Err(self.abandon(
                    chip,
                    info,
                    DhcpPhase::Conflict,
                    BringupError::AddressConflict,
                ));
            }

            match status {
                DhcpStatus::Assigned | DhcpStatus::Changed => {
                    let lease = events.lease.unwrap_or_else(|| self.engine.lease());
                    debug!("DHCP {}: {}", status, lease.ip);
                    apply_lease(info, &lease);
                    commit(chip, info)?;
                }
                DhcpStatus::Leased => {
                    self.engine.stop(chip);
                    apply_lease(info, &self.engine.lease());
                    commit(chip, info)?;
                    self.enter(DhcpPhase::Leased);
                    info!("DHCP leased {}", info.ip);
                    return Ok(());
                }
                DhcpStatus::Failed => {
                    return Err(self.abandon(chip, info, DhcpPhase::Failed, BringupError::DhcpFailed));
                }
                DhcpStatus::Running | DhcpStatus::Stopped => {}
            }

            delay.delay_ms(interval_ms).await;
        }
    }

    fn mode(&self) -> AddressMode {
        AddressMode::Dhcp
    }
}
