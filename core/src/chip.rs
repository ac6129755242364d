//! Chip bring-up: reset pulse, configuration seed and PHY link wait

use embedded_hal::delay::DelayNs as SpinDelay;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use wiz_hal::{BufferPartition, BusAdapter, ChipControl, Clock, Duration, PhyLink};

use crate::bus::BusSession;
use crate::config::{PollConfig, ResetTiming};
use crate::error::BringupError;
use crate::fmt::Debug2Format;

/// Chip drivers that take ownership of a registered bus
pub trait Attach<B: BusAdapter>: ChipControl + Sized {
    fn attach(session: BusSession<B>) -> Self;
}

/// Chip bring-up progress, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipStage {
    Resetting,
    Configuring,
    WaitingLink,
    LinkUp,
    TimedOut,
}

fn enter(stage: ChipStage) {
    info!("Chip stage: {}", stage);
}

/// Pulse the reset line low then high.
///
/// Busy-waits on `spin`; nothing else runs during the pulse.
pub fn hardware_reset<P, S>(
    reset: &mut P,
    spin: &mut S,
    timing: &ResetTiming,
) -> Result<(), BringupError>
where
    P: OutputPin,
    S: SpinDelay,
{
    enter(ChipStage::Resetting);
    reset.set_low().map_err(|e| {
        error!("Reset pin low failed: {}", Debug2Format(&e));
        BringupError::BusInit
    })?;
    spin.delay_us(timing.low_us);
    reset.set_high().map_err(|e| {
        error!("Reset pin high failed: {}", Debug2Format(&e));
        BringupError::BusInit
    })?;
    spin.delay_us(timing.high_us);
    Ok(())
}

/// Push the socket memory partition and reset the chip's internals.
pub fn configure<C: ChipControl>(
    chip: &mut C,
    partition: &BufferPartition,
) -> Result<(), BringupError> {
    enter(ChipStage::Configuring);
    chip.initialize(partition).map_err(|e| {
        error!("Chip initialization failed: {}", Debug2Format(&e));
        BringupError::ChipInit
    })
}

/// Poll the PHY until the link comes up or `poll.timeout` elapses.
///
/// The timeout is measured from loop entry. Read failures are logged and
/// the poll continues.
pub async fn wait_for_link<C, K, Y>(
    chip: &mut C,
    clock: &K,
    delay: &mut Y,
    poll: &PollConfig,
) -> Result<(), BringupError>
where
    C: ChipControl,
    K: Clock,
    Y: DelayNs,
{
    enter(ChipStage::WaitingLink);
    let start = clock.now();
    let interval_ms = u32::try_from(poll.interval.to_millis()).unwrap_or(u32::MAX);

    loop {
        let elapsed = clock
            .now()
            .checked_duration_since(start)
            .unwrap_or(Duration::millis(0));
        if elapsed >= poll.timeout {
            enter(ChipStage::TimedOut);
            return Err(BringupError::LinkTimeout {
                elapsed_ms: elapsed.to_millis(),
            });
        }

        match chip.phy_link() {
            Ok(PhyLink::Up) => {
                enter(ChipStage::LinkUp);
                return Ok(());
            }
            Ok(PhyLink::Down) => trace!("PHY link down"),
            Err(e) => warn!("PHY status read failed: {}", Debug2Format(&e)),
        }

        delay.delay_ms(interval_ms).await;
    }
}
