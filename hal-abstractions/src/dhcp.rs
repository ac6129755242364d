//! DHCP engine interface

use crate::chip::SocketId;
use crate::net::{Ipv4Address, MacAddress};
use crate::time::Instant;

/// Outcome of one DHCP engine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DhcpStatus {
    /// Negotiation gave up
    Failed,
    /// Negotiation in progress
    Running,
    /// A lease was granted for the first time
    Assigned,
    /// A renewed lease carries a different address
    Changed,
    /// Bound to a lease
    Leased,
    /// Engine is not running
    Stopped,
}

/// Fields of a DHCP lease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Lease {
    pub ip: Ipv4Address,
    pub gateway: Ipv4Address,
    pub subnet_mask: Ipv4Address,
    pub dns: Ipv4Address,
    pub lease_time_secs: u32,
}

/// Receiver of events raised while the engine steps
pub trait DhcpListener {
    /// A lease was granted.
    fn on_assign(&mut self, lease: &Lease);

    /// The leased address changed.
    fn on_change(&mut self, lease: &Lease);

    /// Another host answered for the offered address.
    fn on_conflict(&mut self);
}

/// DHCP client state engine driven one step at a time
///
/// The engine borrows the chip for each call instead of owning it, so the
/// caller keeps control of the bus between steps.
pub trait DhcpEngine<C> {
    /// Bind the engine to a socket slot and client hardware address.
    fn configure(&mut self, socket: SocketId, mac: MacAddress);

    /// Advance negotiation without waiting on the network.
    ///
    /// A step performs a bounded number of register accesses: it drains
    /// datagrams already buffered on the chip, checks on the last queued
    /// send and queues at most one new one. Replies and send completions
    /// are picked up by later steps.
    fn step(&mut self, chip: &mut C, now: Instant, listener: &mut dyn DhcpListener)
        -> DhcpStatus;

    /// Abandon negotiation and release the socket.
    fn stop(&mut self, chip: &mut C);

    /// Most recent lease.
    fn lease(&self) -> Lease;
}
