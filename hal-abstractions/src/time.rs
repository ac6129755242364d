//! Monotonic time source

/// Millisecond instant on the board's monotonic timer
pub type Instant = fugit::TimerInstantU64<1_000>;

/// Millisecond duration
pub type Duration = fugit::MillisDurationU64;

/// Monotonic tick source used for timeouts
pub trait Clock {
    /// Current time. Must never go backwards.
    fn now(&self) -> Instant;
}
