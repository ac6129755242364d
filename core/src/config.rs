//! Bring-up configuration structures

use wiz_hal::chip::interrupt;
use wiz_hal::{BufferPartition, Duration, MacAddress, SocketId};

/// Hardware address used when `start` is given no MAC
pub const DEFAULT_MAC_STR: &str = "44:39:c4:7f:e0:59";

/// [`DEFAULT_MAC_STR`] as bytes
pub const DEFAULT_MAC: MacAddress = [0x44, 0x39, 0xc4, 0x7f, 0xe0, 0x59];

/// Reset pulse timing
#[derive(Debug, Clone, Copy)]
pub struct ResetTiming {
    /// Time the reset line is held low
    pub low_us: u32,
    /// Settle time after releasing the line
    pub high_us: u32,
}

impl Default for ResetTiming {
    fn default() -> Self {
        Self {
            low_us: 50,
            high_us: 100,
        }
    }
}

/// Fixed-interval poll with an absolute deadline
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::millis(100),
            timeout: Duration::millis(5_000),
        }
    }
}

/// Policy applied to every socket slot once identity is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketPolicy {
    pub rx_kib: u8,
    pub tx_kib: u8,
    /// Per-socket interrupt mask (`Sn_IMR`)
    pub interrupt_mask: u8,
    /// Chip-wide socket interrupt enable (`SIMR`), one bit per socket
    pub enabled_sockets: u8,
}

impl Default for SocketPolicy {
    fn default() -> Self {
        Self {
            rx_kib: 2,
            tx_kib: 2,
            interrupt_mask: interrupt::TIMEOUT | interrupt::RECV | interrupt::DISCON,
            enabled_sockets: 0xff,
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, Copy)]
pub struct BringupConfig {
    pub reset: ResetTiming,
    /// Memory partition pushed during chip configuration
    pub partition: BufferPartition,
    pub link: PollConfig,
    pub sockets: SocketPolicy,
}

impl Default for BringupConfig {
    fn default() -> Self {
        Self {
            reset: ResetTiming::default(),
            partition: BufferPartition::uniform(2),
            link: PollConfig::default(),
            sockets: SocketPolicy::default(),
        }
    }
}

/// Fixed addresses for the static identity path
#[derive(Debug, Clone, Copy)]
pub struct StaticConfig {
    pub ip: &'static str,
    pub subnet_mask: &'static str,
    pub gateway: &'static str,
}

/// DHCP identity path settings
#[derive(Debug, Clone, Copy)]
pub struct DhcpConfig {
    /// Socket slot used for lease negotiation
    pub socket: SocketId,
    /// RX/TX buffer size for that socket
    pub buffer_kib: u8,
    pub poll: PollConfig,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            socket: 0,
            buffer_kib: 2,
            poll: PollConfig::default(),
        }
    }
}
