//! Serial bus capability slots used by the chip protocol layer

/// Byte-level access to the bus the chip sits on.
///
/// Each method performs exactly one bus operation. Framing a register
/// access (address phase, control phase, data phase) is the job of the
/// chip driver, which must nest the calls as
/// `critical_enter` → `select` → bytes → `deselect` → `critical_exit`.
pub trait BusAdapter {
    /// Error reported by the underlying bus or chip-select line
    type Error: core::fmt::Debug;

    /// Enter a preemption-safe section around a multi-byte transaction.
    fn critical_enter(&mut self);

    /// Leave the section entered by [`critical_enter`](Self::critical_enter).
    fn critical_exit(&mut self);

    /// Take bus ownership (assert chip-select).
    fn select(&mut self) -> Result<(), Self::Error>;

    /// Release bus ownership (deassert chip-select).
    fn deselect(&mut self) -> Result<(), Self::Error>;

    /// Clock one byte out to the chip.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Clock one byte in from the chip.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}
