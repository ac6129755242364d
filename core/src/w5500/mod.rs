//! WIZnet W5500 driver
//!
//! Register-level [`ChipControl`] and [`UdpChannel`] implementation on top
//! of a [`BusSession`]. Every register access is one chip-select framed SPI
//! transaction in variable-length data mode:
//!
//! ```text
//! | addr[15:8] | addr[7:0] | BSB[4:0] RWB OM[1:0] | data ... |
//! ```

pub(crate) mod regs;
mod udp;

use wiz_hal::chip::SOCKET_COUNT;
use wiz_hal::{
    AddressMode, BufferPartition, BusAdapter, ChipControl, Ipv4Address, MacAddress, NetworkInfo,
    PhyLink, SocketId,
};

use crate::bus::BusSession;
use crate::chip::Attach;

/// Total socket memory per direction, in KiB
const MEMORY_KIB: u16 = 16;

/// Bound on register polls while waiting for self-clearing bits
const POLL_LIMIT: usize = 1_000;

/// W5500 driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Bus adapter failure
    Bus(E),
    /// `VERSIONR` did not read back as a W5500
    UnexpectedVersion(u8),
    /// Partition table uses an unsupported size or exceeds chip memory
    InvalidPartition,
    /// A self-clearing register never cleared
    Stuck,
    /// Socket index out of range
    InvalidSocket,
    /// Socket closed underneath a command
    SocketClosed,
    /// Datagram does not fit in the socket's TX memory
    BufferFull,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Bus(e)
    }
}

/// W5500 chip driver
pub struct W5500<B: BusAdapter> {
    bus: BusSession<B>,
    /// The chip has no DNS register; kept here for `network_info`
    dns: Ipv4Address,
    mode: AddressMode,
}

impl<B: BusAdapter> W5500<B> {
    pub fn new(bus: BusSession<B>) -> Self {
        Self {
            bus,
            dns: [0; 4],
            mode: AddressMode::Static,
        }
    }

    /// Release the bus registration.
    pub fn release(self) -> BusSession<B> {
        self.bus
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        self.bus.adapter()
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut B {
        self.bus.adapter_mut()
    }

    fn read(&mut self, bsb: u8, addr: u16, buf: &mut [u8]) -> Result<(), Error<B::Error>> {
        self.bus.transaction(|bus| {
            let [hi, lo] = addr.to_be_bytes();
            bus.write_byte(hi)?;
            bus.write_byte(lo)?;
            bus.write_byte(regs::control(bsb, false))?;
            for byte in buf.iter_mut() {
                *byte = bus.read_byte()?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn write(&mut self, bsb: u8, addr: u16, data: &[u8]) -> Result<(), Error<B::Error>> {
        self.bus.transaction(|bus| {
            let [hi, lo] = addr.to_be_bytes();
            bus.write_byte(hi)?;
            bus.write_byte(lo)?;
            bus.write_byte(regs::control(bsb, true))?;
            for &byte in data {
                bus.write_byte(byte)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn read_u8(&mut self, bsb: u8, addr: u16) -> Result<u8, Error<B::Error>> {
        let mut buf = [0u8; 1];
        self.read(bsb, addr, &mut buf)?;
        Ok(buf[0])
    }

    fn write_u8(&mut self, bsb: u8, addr: u16, value: u8) -> Result<(), Error<B::Error>> {
        self.write(bsb, addr, &[value])
    }

    fn read_u16(&mut self, bsb: u8, addr: u16) -> Result<u16, Error<B::Error>> {
        let mut buf = [0u8; 2];
        self.read(bsb, addr, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_u16(&mut self, bsb: u8, addr: u16, value: u16) -> Result<(), Error<B::Error>> {
        self.write(bsb, addr, &value.to_be_bytes())
    }

    /// Read a 16-bit counter the chip updates concurrently until two
    /// consecutive reads agree.
    fn read_u16_stable(&mut self, bsb: u8, addr: u16) -> Result<u16, Error<B::Error>> {
        let mut last = self.read_u16(bsb, addr)?;
        for _ in 0..POLL_LIMIT {
            let next = self.read_u16(bsb, addr)?;
            if next == last {
                return Ok(next);
            }
            last = next;
        }
        Err(Error::Stuck)
    }

    fn socket_block(socket: SocketId) -> Result<u8, Error<B::Error>> {
        if usize::from(socket) < SOCKET_COUNT {
            Ok(regs::bsb_socket(socket))
        } else {
            Err(Error::InvalidSocket)
        }
    }

    /// Wait for `addr` in `bsb` to read back with `mask` bits clear.
    fn wait_clear(&mut self, bsb: u8, addr: u16, mask: u8) -> Result<(), Error<B::Error>> {
        for _ in 0..POLL_LIMIT {
            if self.read_u8(bsb, addr)? & mask == 0 {
                return Ok(());
            }
        }
        Err(Error::Stuck)
    }

    /// Issue a socket command and wait for the chip to accept it.
    fn socket_command(&mut self, socket: SocketId, command: u8) -> Result<(), Error<B::Error>> {
        let block = Self::socket_block(socket)?;
        self.write_u8(block, regs::SN_CR, command)?;
        self.wait_clear(block, regs::SN_CR, 0xff)
    }

    /// Toggle `PHYCFGR.RST` low then high, keeping the mode bits.
    fn reset_phy(&mut self) -> Result<(), Error<B::Error>> {
        let cfg = self.read_u8(regs::BSB_COMMON, regs::PHYCFGR)?;
        self.write_u8(regs::BSB_COMMON, regs::PHYCFGR, cfg & !regs::PHYCFGR_RST)?;
        let cfg = self.read_u8(regs::BSB_COMMON, regs::PHYCFGR)?;
        self.write_u8(regs::BSB_COMMON, regs::PHYCFGR, cfg | regs::PHYCFGR_RST)
    }
}

fn valid_partition(partition: &BufferPartition) -> bool {
    let sizes_ok = |sizes: &[u8; SOCKET_COUNT]| {
        sizes.iter().all(|kib| matches!(kib, 0 | 1 | 2 | 4 | 8 | 16))
            && sizes.iter().map(|&kib| u16::from(kib)).sum::<u16>() <= MEMORY_KIB
    };
    sizes_ok(&partition.tx_kib) && sizes_ok(&partition.rx_kib)
}

impl<B: BusAdapter> ChipControl for W5500<B> {
    type Error = Error<B::Error>;

    fn initialize(&mut self, partition: &BufferPartition) -> Result<(), Self::Error> {
        let version = self.read_u8(regs::BSB_COMMON, regs::VERSIONR)?;
        if version != regs::CHIP_VERSION {
            error!("Unexpected W5500 version: {=u8:#x}", version);
            return Err(Error::UnexpectedVersion(version));
        }
        if !valid_partition(partition) {
            error!("Invalid socket memory partition");
            return Err(Error::InvalidPartition);
        }

        self.write_u8(regs::BSB_COMMON, regs::MR, regs::MR_RST)?;
        self.wait_clear(regs::BSB_COMMON, regs::MR, regs::MR_RST)?;
        self.reset_phy()?;

        for socket in 0..SOCKET_COUNT as u8 {
            let index = usize::from(socket);
            self.set_socket_buffers(
                socket,
                partition.rx_kib[index],
                partition.tx_kib[index],
            )?;
        }
        debug!("W5500 reset and partitioned");
        Ok(())
    }

    fn phy_link(&mut self) -> Result<PhyLink, Self::Error> {
        let cfg = self.read_u8(regs::BSB_COMMON, regs::PHYCFGR)?;
        Ok(if cfg & regs::PHYCFGR_LNK != 0 {
            PhyLink::Up
        } else {
            PhyLink::Down
        })
    }

    fn set_network_info(&mut self, info: &NetworkInfo) -> Result<(), Self::Error> {
        self.write(regs::BSB_COMMON, regs::SHAR, &info.mac)?;
        self.write(regs::BSB_COMMON, regs::GAR, &info.gateway)?;
        self.write(regs::BSB_COMMON, regs::SUBR, &info.subnet_mask)?;
        self.write(regs::BSB_COMMON, regs::SIPR, &info.ip)?;
        self.dns = info.dns;
        self.mode = info.mode;
        Ok(())
    }

    fn network_info(&mut self) -> Result<NetworkInfo, Self::Error> {
        let mut info = NetworkInfo {
            dns: self.dns,
            mode: self.mode,
            ..NetworkInfo::default()
        };
        self.read(regs::BSB_COMMON, regs::SHAR, &mut info.mac)?;
        self.read(regs::BSB_COMMON, regs::GAR, &mut info.gateway)?;
        self.read(regs::BSB_COMMON, regs::SUBR, &mut info.subnet_mask)?;
        self.read(regs::BSB_COMMON, regs::SIPR, &mut info.ip)?;
        Ok(info)
    }

    fn chip_id(&mut self) -> Result<[u8; 6], Self::Error> {
        Ok(*b"W5500\0")
    }

    fn set_source_mac(&mut self, mac: &MacAddress) -> Result<(), Self::Error> {
        self.write(regs::BSB_COMMON, regs::SHAR, mac)
    }

    fn set_socket_buffers(
        &mut self,
        socket: SocketId,
        rx_kib: u8,
        tx_kib: u8,
    ) -> Result<(), Self::Error> {
        let block = Self::socket_block(socket)?;
        self.write_u8(block, regs::SN_RXBUF_SIZE, rx_kib)?;
        self.write_u8(block, regs::SN_TXBUF_SIZE, tx_kib)
    }

    fn set_socket_interrupt_mask(
        &mut self,
        socket: SocketId,
        mask: u8,
    ) -> Result<(), Self::Error> {
        let block = Self::socket_block(socket)?;
        self.write_u8(block, regs::SN_IMR, mask)
    }

    fn enable_socket_interrupts(&mut self, sockets: u8) -> Result<(), Self::Error> {
        self.write_u8(regs::BSB_COMMON, regs::SIMR, sockets)
    }

    fn max_segment_size(&mut self, socket: SocketId) -> Result<u16, Self::Error> {
        let block = Self::socket_block(socket)?;
        self.read_u16(block, regs::SN_MSSR)
    }
}

impl<B: BusAdapter> Attach<B> for W5500<B> {
    fn attach(session: BusSession<B>) -> Self {
        Self::new(session)
    }
}
