//! W5500 register map
//!
//! # Reference
//! WIZnet W5500 Datasheet v1.1.0, Section 4 (Register Descriptions)

// SPI frame control phase

/// Read/Write Access Mode bit (1 = write).
pub const RWB_WRITE: u8 = 1 << 2;
/// Variable Data Length Mode (chip-select framed).
pub const OM_VDM: u8 = 0b00;

/// Block select for the common register block.
pub const BSB_COMMON: u8 = 0x00;

/// Block select for socket `n`'s register block.
pub const fn bsb_socket(n: u8) -> u8 {
    n * 4 + 1
}

/// Block select for socket `n`'s TX buffer.
pub const fn bsb_tx(n: u8) -> u8 {
    n * 4 + 2
}

/// Block select for socket `n`'s RX buffer.
pub const fn bsb_rx(n: u8) -> u8 {
    n * 4 + 3
}

/// Control phase byte for a block access.
pub const fn control(bsb: u8, write: bool) -> u8 {
    let rwb = if write { RWB_WRITE } else { 0 };
    (bsb << 3) | rwb | OM_VDM
}

// Common registers

/// Mode Register.
pub const MR: u16 = 0x0000;
/// Gateway IP Address (4 bytes).
pub const GAR: u16 = 0x0001;
/// Subnet Mask (4 bytes).
pub const SUBR: u16 = 0x0005;
/// Source Hardware Address (6 bytes).
pub const SHAR: u16 = 0x0009;
/// Source IP Address (4 bytes).
pub const SIPR: u16 = 0x000F;
/// Socket Interrupt Mask.
pub const SIMR: u16 = 0x0018;
/// PHY Configuration.
pub const PHYCFGR: u16 = 0x002E;
/// Chip Version (RO).
pub const VERSIONR: u16 = 0x0039;

/// MR: software reset, self-clearing.
pub const MR_RST: u8 = 0x80;
/// PHYCFGR: PHY reset when written low.
pub const PHYCFGR_RST: u8 = 0x80;
/// PHYCFGR: link status (RO).
pub const PHYCFGR_LNK: u8 = 0x01;
/// Expected VERSIONR value.
pub const CHIP_VERSION: u8 = 0x04;

// Socket registers (offsets inside a socket block)

/// Socket Mode.
pub const SN_MR: u16 = 0x0000;
/// Socket Command.
pub const SN_CR: u16 = 0x0001;
/// Socket Interrupt.
pub const SN_IR: u16 = 0x0002;
/// Socket Status (RO).
pub const SN_SR: u16 = 0x0003;
/// Source Port (2 bytes).
pub const SN_PORT: u16 = 0x0004;
/// Destination IP Address (4 bytes).
pub const SN_DIPR: u16 = 0x000C;
/// Destination Port (2 bytes).
pub const SN_DPORT: u16 = 0x0010;
/// Maximum Segment Size (2 bytes).
pub const SN_MSSR: u16 = 0x0012;
/// Receive Buffer Size in KiB.
pub const SN_RXBUF_SIZE: u16 = 0x001E;
/// Transmit Buffer Size in KiB.
pub const SN_TXBUF_SIZE: u16 = 0x001F;
/// TX Free Size (2 bytes, RO).
pub const SN_TX_FSR: u16 = 0x0020;
/// TX Write Pointer (2 bytes).
pub const SN_TX_WR: u16 = 0x0024;
/// RX Received Size (2 bytes, RO).
pub const SN_RX_RSR: u16 = 0x0026;
/// RX Read Pointer (2 bytes).
pub const SN_RX_RD: u16 = 0x0028;
/// Socket Interrupt Mask.
pub const SN_IMR: u16 = 0x002C;

/// Sn_MR: UDP protocol.
pub const SN_MR_UDP: u8 = 0x02;

/// Sn_CR commands (register reads back 0 once accepted).
pub const SN_CR_OPEN: u8 = 0x01;
pub const SN_CR_CLOSE: u8 = 0x10;
pub const SN_CR_SEND: u8 = 0x20;
pub const SN_CR_RECV: u8 = 0x40;

/// Sn_SR values.
pub const SOCK_CLOSED: u8 = 0x00;
pub const SOCK_UDP: u8 = 0x22;

/// Header the chip prepends to each UDP datagram in the RX buffer.
pub const UDP_HEADER_LEN: usize = 8;
