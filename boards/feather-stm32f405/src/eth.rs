//! Ethernet FeatherWing hardware layer

use defmt::info;
use embassy_stm32::gpio::Output;
use embassy_stm32::mode::Blocking;
use embassy_stm32::spi::Spi;
use wiz_core::bus::HalBus;
use wiz_core::w5500::W5500;
use wiz_core::{Bringup, Platform};

use crate::network::config::{self, Resolver};
use crate::time::{CycleDelay, MonoClock, MonoDelay};

/// W5500 behind SPI2 and a GPIO chip-select
pub type EthBus = HalBus<Spi<'static, Blocking>, Output<'static>>;

pub type EthBringup = Bringup<EthBus, W5500<EthBus>, Resolver>;

pub type EthPlatform = Platform<Output<'static>, CycleDelay, MonoDelay, MonoClock>;

/// Ethernet peripherals bundle
pub struct EthPeripherals {
    pub spi: Spi<'static, Blocking>,
    /// Driven high before handing over
    pub cs: Output<'static>,
    pub reset: Output<'static>,
}

/// Wrap the peripherals in a bring-up context and the platform it runs on.
///
/// Nothing touches the chip until the context is started.
pub fn init(periph: EthPeripherals) -> (EthBringup, EthPlatform) {
    let EthPeripherals { spi, cs, reset } = periph;

    let bringup = Bringup::new(HalBus::new(spi, cs), config::resolver(), config::bringup_config());
    let platform = Platform {
        reset,
        spin: CycleDelay::new(config::SYSCLK_HZ),
        delay: MonoDelay,
        clock: MonoClock,
    };
    info!("W5500 context ready on SPI2");
    (bringup, platform)
}
