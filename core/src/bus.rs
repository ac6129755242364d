//! Bus adapter registration and transaction framing
//!
//! A [`BusSession`] is the registered callback set: it exclusively owns the
//! board's [`BusAdapter`] for as long as a chip driver uses it. Only one
//! session may exist at a time; a second registration is refused and the
//! adapter handed back.
//!
//! [`HalBus`] is the stock adapter built from an `embedded-hal` SPI bus and
//! a chip-select pin, with critical sections from the `critical-section`
//! crate.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use wiz_hal::BusAdapter;

static BUS_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Returned by [`BusSession::register`] when another session is active
#[derive(Debug)]
pub struct SessionBusy<B>(pub B);

/// Holds the registration; dropping it frees the bus for the next session.
struct Claim;

impl Drop for Claim {
    fn drop(&mut self) {
        BUS_CLAIMED.store(false, Ordering::Release);
    }
}

/// Exclusive registration of a bus adapter
pub struct BusSession<B: BusAdapter> {
    adapter: B,
    _claim: Claim,
}

impl<B: BusAdapter> BusSession<B> {
    /// Register `adapter` as the active bus owner.
    pub fn register(adapter: B) -> Result<Self, SessionBusy<B>> {
        if BUS_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            error!("Bus adapter already registered");
            return Err(SessionBusy(adapter));
        }
        debug!("Bus adapter registered");
        Ok(Self {
            adapter,
            _claim: Claim,
        })
    }

    /// `true` while some session holds the registration.
    pub fn is_active() -> bool {
        BUS_CLAIMED.load(Ordering::Acquire)
    }

    /// Run one framed transaction.
    ///
    /// The critical section wraps chip-select, which wraps the byte
    /// transfers done by `f`. Chip-select is released even when `f` fails.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut B) -> Result<T, B::Error>,
    ) -> Result<T, B::Error> {
        self.adapter.critical_enter();
        let result = match self.adapter.select() {
            Ok(()) => {
                let out = f(&mut self.adapter);
                let released = self.adapter.deselect();
                out.and_then(|value| released.map(|()| value))
            }
            Err(e) => Err(e),
        };
        self.adapter.critical_exit();
        result
    }

    /// Unregister and return the adapter.
    pub fn release(self) -> B {
        self.adapter
    }

    #[cfg(test)]
    pub(crate) fn adapter(&self) -> &B {
        &self.adapter
    }

    #[cfg(test)]
    pub(crate) fn adapter_mut(&mut self) -> &mut B {
        &mut self.adapter
    }
}

/// Errors from [`HalBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalBusError<S, P> {
    Spi(S),
    ChipSelect(P),
}

/// [`BusAdapter`] over an `embedded-hal` SPI bus and chip-select pin
pub struct HalBus<SPI, CS> {
    spi: SPI,
    cs: CS,
    restore: Option<critical_section::RestoreState>,
}

impl<SPI, CS> HalBus<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    /// Chip-select must already be driven high (deasserted).
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self {
            spi,
            cs,
            restore: None,
        }
    }

    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

#[allow(unsafe_code)] // Required for critical_section::acquire/release
impl<SPI, CS> BusAdapter for HalBus<SPI, CS>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
{
    type Error = HalBusError<SPI::Error, CS::Error>;

    fn critical_enter(&mut self) {
        if self.restore.is_none() {
            // SAFETY: released in critical_exit; BusSession::transaction
            // always pairs the two calls.
            self.restore = Some(unsafe { critical_section::acquire() });
        }
    }

    fn critical_exit(&mut self) {
        if let Some(state) = self.restore.take() {
            // SAFETY: `state` came from the matching acquire above.
            unsafe { critical_section::release(state) };
        }
    }

    fn select(&mut self) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(HalBusError::ChipSelect)
    }

    fn deselect(&mut self) -> Result<(), Self::Error> {
        // Clock out everything before releasing the chip
        self.spi.flush().map_err(HalBusError::Spi)?;
        self.cs.set_high().map_err(HalBusError::ChipSelect)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.spi.write(&[byte]).map_err(HalBusError::Spi)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.spi.read(&mut buf).map_err(HalBusError::Spi)?;
        Ok(buf[0])
    }
}
