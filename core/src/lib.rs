//! Platform-agnostic bring-up logic for WIZnet Ethernet chips
//!
//! Takes a chip from power-on to a network-ready state: hardware reset,
//! bus registration, PHY link wait, network identity (static or DHCP) and
//! socket pool setup. It has NO hardware dependencies; boards plug in
//! through the traits in `wiz-hal` and `embedded-hal`.
//!
//! ## Pipeline
//!
//! ```text
//! Bringup::run
//!   ├─ bus::BusSession::register      (one active bus owner)
//!   ├─ chip::hardware_reset           (spin-delay reset pulse)
//!   ├─ chip::configure                (partition table, PHY reset)
//!   ├─ chip::wait_for_link            (100 ms poll, 5 s timeout)
//!   ├─ identity::Resolve::resolve     (StaticResolver | DhcpResolver)
//!   └─ socket::init_pool              (buffer sizes, interrupt masks)
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
#![deny(warnings)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod addr;
pub mod bringup;
pub mod bus;
pub mod chip;
pub mod command;
pub mod config;
pub mod dhcp;
pub mod error;
pub mod identity;
pub mod socket;
pub mod w5500;

#[cfg(test)]
pub(crate) mod testing;

pub use bringup::{Bringup, Platform};
pub use config::{BringupConfig, DhcpConfig, StaticConfig};
pub use error::BringupError;
pub use identity::{DhcpResolver, Resolve, StaticResolver};

/// Package version reported in bring-up outcome messages
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
