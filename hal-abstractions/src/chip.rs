//! Chip control and UDP socket traits

use crate::net::{Ipv4Address, MacAddress, NetworkInfo};

/// Number of hardware socket slots on the chip
pub const SOCKET_COUNT: usize = 8;

/// Hardware socket slot index (`0..SOCKET_COUNT`)
pub type SocketId = u8;

/// Socket interrupt mask bits (`Sn_IMR` / `Sn_IR`)
pub mod interrupt {
    /// SEND command completed
    pub const SEND_OK: u8 = 0x10;
    /// ARP or TCP retransmission timeout
    pub const TIMEOUT: u8 = 0x08;
    /// Data received
    pub const RECV: u8 = 0x04;
    /// FIN/RST received
    pub const DISCON: u8 = 0x02;
    /// Connection established
    pub const CON: u8 = 0x01;
}

/// Physical link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhyLink {
    Down,
    Up,
}

/// Per-socket TX/RX memory sizes in KiB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BufferPartition {
    pub tx_kib: [u8; SOCKET_COUNT],
    pub rx_kib: [u8; SOCKET_COUNT],
}

impl BufferPartition {
    /// Same size in both directions for every socket
    pub const fn uniform(kib: u8) -> Self {
        Self {
            tx_kib: [kib; SOCKET_COUNT],
            rx_kib: [kib; SOCKET_COUNT],
        }
    }
}

/// Chip-level control operations
///
/// All operations are synchronous and report bus failures through
/// `Self::Error` instead of panicking.
pub trait ChipControl {
    type Error: core::fmt::Debug;

    /// Reset the chip's internals and apply the socket memory partition.
    fn initialize(&mut self, partition: &BufferPartition) -> Result<(), Self::Error>;

    /// Read the PHY link status.
    fn phy_link(&mut self) -> Result<PhyLink, Self::Error>;

    /// Write MAC, IP, gateway, mask and DNS into the chip configuration.
    fn set_network_info(&mut self, info: &NetworkInfo) -> Result<(), Self::Error>;

    /// Read back the committed network configuration.
    fn network_info(&mut self) -> Result<NetworkInfo, Self::Error>;

    /// NUL-padded chip identifier, e.g. `b"W5500\0"`.
    fn chip_id(&mut self) -> Result<[u8; 6], Self::Error>;

    /// Write only the source hardware address register.
    fn set_source_mac(&mut self, mac: &MacAddress) -> Result<(), Self::Error>;

    /// Set one socket's RX/TX buffer sizes in KiB.
    fn set_socket_buffers(
        &mut self,
        socket: SocketId,
        rx_kib: u8,
        tx_kib: u8,
    ) -> Result<(), Self::Error>;

    /// Set which events raise an interrupt for one socket.
    fn set_socket_interrupt_mask(&mut self, socket: SocketId, mask: u8)
        -> Result<(), Self::Error>;

    /// Enable the chip-wide interrupt for the sockets whose bits are set.
    fn enable_socket_interrupts(&mut self, sockets: u8) -> Result<(), Self::Error>;

    /// Maximum segment size configured on a socket.
    fn max_segment_size(&mut self, socket: SocketId) -> Result<u16, Self::Error>;
}

/// Result of handing a datagram to the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SendOutcome {
    /// The datagram left the chip
    Sent,
    /// Address resolution for the destination timed out
    TimedOut,
}

/// Metadata of a received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Datagram {
    pub source: Ipv4Address,
    pub port: u16,
    /// Bytes copied into the caller's buffer
    pub len: usize,
}

/// Connectionless datagram access to a hardware socket
pub trait UdpChannel {
    type Error: core::fmt::Debug;

    /// Open `socket` in UDP mode bound to `local_port`.
    fn open_udp(&mut self, socket: SocketId, local_port: u16) -> Result<(), Self::Error>;

    /// Queue one datagram and return without waiting for it to leave.
    ///
    /// A unicast destination may take the chip's full ARP retry window to
    /// resolve; poll [`UdpChannel::send_status`] for the outcome before
    /// queueing the next datagram on the same socket.
    fn send_to(
        &mut self,
        socket: SocketId,
        dest: Ipv4Address,
        port: u16,
        payload: &[u8],
    ) -> Result<(), Self::Error>;

    /// Outcome of the last `send_to` on `socket`, or `None` while the chip
    /// is still working on it.
    fn send_status(&mut self, socket: SocketId) -> Result<Option<SendOutcome>, Self::Error>;

    /// Take the next pending datagram, if any. Excess bytes beyond `buf`
    /// are discarded.
    fn recv_from(
        &mut self,
        socket: SocketId,
        buf: &mut [u8],
    ) -> Result<Option<Datagram>, Self::Error>;

    /// Close `socket`.
    fn close(&mut self, socket: SocketId) -> Result<(), Self::Error>;
}
