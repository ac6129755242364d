//! Delay and clock sources backed by the core and TIM2

use embedded_hal::delay::DelayNs as SpinDelay;
use embedded_hal_async::delay::DelayNs;
use rtic_monotonics::stm32::prelude::*;
use wiz_hal::{Clock, Instant};

use crate::Mono;

/// Busy-wait counted in core cycles, for waits shorter than a timer tick
pub struct CycleDelay {
    cycles_per_us: u32,
}

impl CycleDelay {
    pub const fn new(sysclk_hz: u32) -> Self {
        Self {
            cycles_per_us: sysclk_hz / 1_000_000,
        }
    }
}

impl SpinDelay for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (u64::from(ns) * u64::from(self.cycles_per_us)).div_ceil(1_000);
        cortex_m::asm::delay(u32::try_from(cycles).unwrap_or(u32::MAX));
    }
}

/// Yields to other RTIC tasks while waiting
pub struct MonoDelay;

impl DelayNs for MonoDelay {
    async fn delay_ns(&mut self, ns: u32) {
        Mono::delay(u64::from(ns).nanos_at_least()).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        Mono::delay(u64::from(ms).millis()).await;
    }
}

/// Millisecond view of the TIM2 monotonic
pub struct MonoClock;

impl Clock for MonoClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(Mono::now().duration_since_epoch().to_millis())
    }
}
