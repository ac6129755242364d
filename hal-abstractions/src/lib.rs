//! Hardware abstraction traits for WIZnet chip bring-up
//!
//! This crate defines the seams between the bring-up core and the outside
//! world. Boards implement the bus and clock traits, chip drivers implement
//! `ChipControl` and `UdpChannel`, and DHCP clients implement `DhcpEngine`.
//! It has NO hardware dependencies.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod bus;
pub mod chip;
pub mod dhcp;
pub mod net;
pub mod time;

pub use bus::BusAdapter;
pub use chip::{
    BufferPartition, ChipControl, Datagram, PhyLink, SendOutcome, SocketId, UdpChannel, SOCKET_COUNT,
};
pub use dhcp::{DhcpEngine, DhcpListener, DhcpStatus, Lease};
pub use net::{AddressMode, Ipv4Address, MacAddress, NetworkInfo};
pub use time::{Clock, Duration, Instant};
