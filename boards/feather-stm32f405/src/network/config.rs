//! Build-time network settings
//!
//! ## Wiring (Ethernet FeatherWing on SPI2)
//!
//! | Signal | Pin  |
//! |--------|------|
//! | SCK    | PB13 |
//! | MISO   | PB14 |
//! | MOSI   | PB15 |
//! | CS     | PC6  |
//! | RESET  | PC3  |
//! | INT    | PC2  |

use wiz_core::BringupConfig;
#[cfg(feature = "dhcp")]
use wiz_core::dhcp::{ClientTiming, DhcpClient};
#[cfg(feature = "dhcp")]
use wiz_core::{DhcpConfig, DhcpResolver};
#[cfg(not(feature = "dhcp"))]
use wiz_core::{StaticConfig, StaticResolver};

/// W5500 SPI clock; the chip tolerates up to 33 MHz but the wing's traces do not
pub const SPI_FREQUENCY_HZ: u32 = 10_000_000;

/// Core clock, used to turn nanoseconds into spin cycles
pub const SYSCLK_HZ: u32 = 84_000_000;

/// Addresses committed when the `dhcp` feature is off
#[cfg(not(feature = "dhcp"))]
pub const STATIC: StaticConfig = StaticConfig {
    ip: "192.168.1.50",
    subnet_mask: "255.255.255.0",
    gateway: "192.168.1.1",
};

/// Optional MAC override passed to `start`; the library default when empty
pub const MAC_ARGS: &[&str] = &[];

#[cfg(feature = "dhcp")]
pub type Resolver = DhcpResolver<DhcpClient>;

#[cfg(not(feature = "dhcp"))]
pub type Resolver = StaticResolver;

#[cfg(feature = "dhcp")]
pub fn resolver() -> Resolver {
    DhcpResolver::new(DhcpClient::new(ClientTiming::default()), DhcpConfig::default())
}

#[cfg(not(feature = "dhcp"))]
pub fn resolver() -> Resolver {
    StaticResolver::new(STATIC)
}

pub fn bringup_config() -> BringupConfig {
    BringupConfig::default()
}
