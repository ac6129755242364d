//! UDP mode on W5500 hardware sockets

use wiz_hal::chip::interrupt;
use wiz_hal::{BusAdapter, Datagram, Ipv4Address, SendOutcome, SocketId, UdpChannel};

use super::{regs, Error, W5500};

impl<B: BusAdapter> UdpChannel for W5500<B> {
    type Error = Error<B::Error>;

    fn open_udp(&mut self, socket: SocketId, local_port: u16) -> Result<(), Self::Error> {
        let block = Self::socket_block(socket)?;
        self.close(socket)?;
        self.write_u8(block, regs::SN_MR, regs::SN_MR_UDP)?;
        self.write_u16(block, regs::SN_PORT, local_port)?;
        self.socket_command(socket, regs::SN_CR_OPEN)?;

        if self.read_u8(block, regs::SN_SR)? != regs::SOCK_UDP {
            return Err(Error::SocketClosed);
        }
        debug!("Socket {} open (UDP port {})", socket, local_port);
        Ok(())
    }

    fn send_to(
        &mut self,
        socket: SocketId,
        dest: Ipv4Address,
        port: u16,
        payload: &[u8],
    ) -> Result<(), Self::Error> {
        let block = Self::socket_block(socket)?;
        if self.read_u8(block, regs::SN_SR)? != regs::SOCK_UDP {
            return Err(Error::SocketClosed);
        }
        let free = self.read_u16_stable(block, regs::SN_TX_FSR)?;
        if payload.len() > usize::from(free) {
            return Err(Error::BufferFull);
        }

        self.write(block, regs::SN_DIPR, &dest)?;
        self.write_u16(block, regs::SN_DPORT, port)?;

        // The chip wraps the 16-bit pointer inside the socket's buffer
        let ptr = self.read_u16(block, regs::SN_TX_WR)?;
        self.write(regs::bsb_tx(socket), ptr, payload)?;
        self.write_u16(
            block,
            regs::SN_TX_WR,
            ptr.wrapping_add(payload.len() as u16),
        )?;
        self.socket_command(socket, regs::SN_CR_SEND)
    }

    fn send_status(&mut self, socket: SocketId) -> Result<Option<SendOutcome>, Self::Error> {
        let block = Self::socket_block(socket)?;
        let ir = self.read_u8(block, regs::SN_IR)?;
        if ir & interrupt::SEND_OK != 0 {
            self.write_u8(block, regs::SN_IR, interrupt::SEND_OK)?;
            return Ok(Some(SendOutcome::Sent));
        }
        if ir & interrupt::TIMEOUT != 0 {
            self.write_u8(block, regs::SN_IR, interrupt::SEND_OK | interrupt::TIMEOUT)?;
            return Ok(Some(SendOutcome::TimedOut));
        }
        if self.read_u8(block, regs::SN_SR)? == regs::SOCK_CLOSED {
            return Err(Error::SocketClosed);
        }
        Ok(None)
    }

    fn recv_from(
        &mut self,
        socket: SocketId,
        buf: &mut [u8],
    ) -> Result<Option<Datagram>, Self::Error> {
        let block = Self::socket_block(socket)?;
        let pending = self.read_u16_stable(block, regs::SN_RX_RSR)?;
        if usize::from(pending) < regs::UDP_HEADER_LEN {
            return Ok(None);
        }

        let ptr = self.read_u16(block, regs::SN_RX_RD)?;
        let mut header = [0u8; regs::UDP_HEADER_LEN];
        self.read(regs::bsb_rx(socket), ptr, &mut header)?;
        let source = [header[0], header[1], header[2], header[3]];
        let port = u16::from_be_bytes([header[4], header[5]]);
        let len = u16::from_be_bytes([header[6], header[7]]);

        let data_ptr = ptr.wrapping_add(regs::UDP_HEADER_LEN as u16);
        let copied = usize::from(len).min(buf.len());
        self.read(regs::bsb_rx(socket), data_ptr, &mut buf[..copied])?;
        if copied < usize::from(len) {
            warn!("Datagram truncated: {} of {} bytes", copied, len);
        }

        self.write_u16(block, regs::SN_RX_RD, data_ptr.wrapping_add(len))?;
        self.socket_command(socket, regs::SN_CR_RECV)?;

        Ok(Some(Datagram {
            source,
            port,
            len: copied,
        }))
    }

    fn close(&mut self, socket: SocketId) -> Result<(), Self::Error> {
        let block = Self::socket_block(socket)?;
        self.socket_command(socket, regs::SN_CR_CLOSE)?;
        // Clear all pending socket interrupts
        self.write_u8(block, regs::SN_IR, 0xff)
    }
}
