//! Host-side doubles for buses, pins, chips, clocks and DHCP engines

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard};

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use wiz_hal::chip::{interrupt, SOCKET_COUNT};
use wiz_hal::{
    BufferPartition, BusAdapter, ChipControl, Clock, Datagram, DhcpEngine, DhcpListener,
    DhcpStatus, Instant, Ipv4Address, Lease, MacAddress, NetworkInfo, PhyLink, SendOutcome,
    SocketId, UdpChannel,
};

use smoltcp::wire::DhcpMessageType;

use crate::dhcp::message::{server_reply, Seen};
use crate::w5500::regs;

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that register a bus session.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Bus and pins

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    CriticalEnter,
    CriticalExit,
    Select,
    Deselect,
    Write(u8),
    Read(u8),
}

/// Bus adapter that logs every call; reads return `0x5A`
#[derive(Default)]
pub struct RecordingBus {
    pub events: Vec<BusEvent>,
    pub fail_reads: bool,
}

impl BusAdapter for RecordingBus {
    type Error = ();

    fn critical_enter(&mut self) {
        self.events.push(BusEvent::CriticalEnter);
    }

    fn critical_exit(&mut self) {
        self.events.push(BusEvent::CriticalExit);
    }

    fn select(&mut self) -> Result<(), ()> {
        self.events.push(BusEvent::Select);
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), ()> {
        self.events.push(BusEvent::Deselect);
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), ()> {
        self.events.push(BusEvent::Write(byte));
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, ()> {
        if self.fail_reads {
            return Err(());
        }
        self.events.push(BusEvent::Read(0x5A));
        Ok(0x5A)
    }
}

/// Output pin recording every level it is driven to
#[derive(Default)]
pub struct MockPin {
    pub levels: Vec<bool>,
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.push(true);
        Ok(())
    }
}

#[derive(Debug)]
pub struct PinError;

impl embedded_hal::digital::Error for PinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin whose every write fails
pub struct FailingPin;

impl ErrorType for FailingPin {
    type Error = PinError;
}

impl OutputPin for FailingPin {
    fn set_low(&mut self) -> Result<(), PinError> {
        Err(PinError)
    }

    fn set_high(&mut self) -> Result<(), PinError> {
        Err(PinError)
    }
}

// Time

/// Manually advanced millisecond clock; clones share the same time
#[derive(Default, Clone)]
pub struct MockClock {
    ms: Rc<Cell<u64>>,
}

impl MockClock {
    pub fn millis(&self) -> u64 {
        self.ms.get()
    }

    pub fn advance(&self, ms: u64) {
        self.ms.set(self.ms.get() + ms);
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.ms.get())
    }
}

/// Async delay that returns at once after advancing a [`MockClock`]
pub struct MockDelay {
    clock: MockClock,
}

impl MockDelay {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl embedded_hal_async::delay::DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance(u64::from(ns) / 1_000_000);
    }

    async fn delay_us(&mut self, us: u32) {
        self.clock.advance(u64::from(us) / 1_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.advance(u64::from(ms));
    }
}

/// Blocking delay that records requested waits in nanoseconds
#[derive(Default)]
pub struct SpinRecorder {
    pub waits_ns: Vec<u64>,
}

impl embedded_hal::delay::DelayNs for SpinRecorder {
    fn delay_ns(&mut self, ns: u32) {
        self.waits_ns.push(u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.waits_ns.push(u64::from(us) * 1_000);
    }
}

// Chip and DHCP doubles

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedError;

/// [`ChipControl`] keeping state in plain fields
#[derive(Default)]
pub struct ScriptedChip {
    /// Last committed identity
    pub info: NetworkInfo,
    pub commits: Vec<NetworkInfo>,
    pub partition: Option<BufferPartition>,
    pub fail_initialize: bool,
    /// Fail every register write
    pub fail_writes: bool,
    /// Link polls answered `Down` before reporting `Up`
    pub down_polls: usize,
    /// Link polls that fail before any `Down`/`Up` answer
    pub link_errors: usize,
    pub link_polls: usize,
    pub source_mac: Option<MacAddress>,
    pub socket_buffers: [(u8, u8); SOCKET_COUNT],
    pub socket_masks: [u8; SOCKET_COUNT],
    pub enabled_sockets: u8,
    pub mss: u16,
}

impl ScriptedChip {
    pub fn with_link_after(down_polls: usize) -> Self {
        Self {
            down_polls,
            ..Self::default()
        }
    }

    fn writable(&self) -> Result<(), ScriptedError> {
        if self.fail_writes {
            Err(ScriptedError)
        } else {
            Ok(())
        }
    }
}

impl ChipControl for ScriptedChip {
    type Error = ScriptedError;

    fn initialize(&mut self, partition: &BufferPartition) -> Result<(), ScriptedError> {
        if self.fail_initialize {
            return Err(ScriptedError);
        }
        self.partition = Some(*partition);
        Ok(())
    }

    fn phy_link(&mut self) -> Result<PhyLink, ScriptedError> {
        self.link_polls += 1;
        if self.link_errors > 0 {
            self.link_errors -= 1;
            return Err(ScriptedError);
        }
        if self.down_polls > 0 {
            self.down_polls -= 1;
            return Ok(PhyLink::Down);
        }
        Ok(PhyLink::Up)
    }

    fn set_network_info(&mut self, info: &NetworkInfo) -> Result<(), ScriptedError> {
        self.writable()?;
        self.info = *info;
        self.commits.push(*info);
        Ok(())
    }

    fn network_info(&mut self) -> Result<NetworkInfo, ScriptedError> {
        Ok(self.info)
    }

    fn chip_id(&mut self) -> Result<[u8; 6], ScriptedError> {
        Ok(*b"MOCK\0\0")
    }

    fn set_source_mac(&mut self, mac: &MacAddress) -> Result<(), ScriptedError> {
        self.writable()?;
        self.source_mac = Some(*mac);
        self.info.mac = *mac;
        Ok(())
    }

    fn set_socket_buffers(
        &mut self,
        socket: SocketId,
        rx_kib: u8,
        tx_kib: u8,
    ) -> Result<(), ScriptedError> {
        self.writable()?;
        self.socket_buffers[usize::from(socket)] = (rx_kib, tx_kib);
        Ok(())
    }

    fn set_socket_interrupt_mask(&mut self, socket: SocketId, mask: u8) -> Result<(), ScriptedError> {
        self.writable()?;
        self.socket_masks[usize::from(socket)] = mask;
        Ok(())
    }

    fn enable_socket_interrupts(&mut self, sockets: u8) -> Result<(), ScriptedError> {
        self.writable()?;
        self.enabled_sockets = sockets;
        Ok(())
    }

    fn max_segment_size(&mut self, _socket: SocketId) -> Result<u16, ScriptedError> {
        Ok(self.mss)
    }
}

/// DHCP engine replaying a fixed status sequence, then `Running` forever
pub struct ScriptedDhcp {
    script: VecDeque<DhcpStatus>,
    lease: Lease,
    pub configured: Option<(SocketId, MacAddress)>,
    pub steps: usize,
    pub stopped: bool,
    /// Step index at which a conflict event is raised
    pub conflict_at: Option<usize>,
}

impl ScriptedDhcp {
    pub fn new(script: Vec<DhcpStatus>, lease: Lease) -> Self {
        Self {
            script: script.into(),
            lease,
            configured: None,
            steps: 0,
            stopped: false,
            conflict_at: None,
        }
    }
}

impl<C> DhcpEngine<C> for ScriptedDhcp {
    fn configure(&mut self, socket: SocketId, mac: MacAddress) {
        self.configured = Some((socket, mac));
    }

    fn step(&mut self, _chip: &mut C, _now: Instant, listener: &mut dyn DhcpListener) -> DhcpStatus {
        let index = self.steps;
        self.steps += 1;
        if self.conflict_at == Some(index) {
            listener.on_conflict();
            return DhcpStatus::Running;
        }

        let status = self.script.pop_front().unwrap_or(DhcpStatus::Running);
        match status {
            DhcpStatus::Assigned => listener.on_assign(&self.lease),
            DhcpStatus::Changed => listener.on_change(&self.lease),
            _ => {}
        }
        status
    }

    fn stop(&mut self, _chip: &mut C) {
        self.stopped = true;
    }

    fn lease(&self) -> Lease {
        self.lease
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub assigned: Vec<Lease>,
    pub changed: Vec<Lease>,
    pub conflicts: usize,
}

impl DhcpListener for RecordingListener {
    fn on_assign(&mut self, lease: &Lease) {
        self.assigned.push(*lease);
    }

    fn on_change(&mut self, lease: &Lease) {
        self.changed.push(*lease);
    }

    fn on_conflict(&mut self) {
        self.conflicts += 1;
    }
}

/// Datagram handed to a UDP double
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub socket: SocketId,
    pub dest: Ipv4Address,
    pub port: u16,
    pub payload: Vec<u8>,
}

const BROADCAST: Ipv4Address = [255; 4];

/// [`UdpChannel`] with a scripted inbox
///
/// Broadcasts always go out; unicast sends report `Sent` only when
/// `answer_arp` is set, as if ARP had been answered. With
/// `stall_unicast` a unicast send never completes.
#[derive(Default)]
pub struct MockUdp {
    pub opened: Vec<(SocketId, u16)>,
    pub closed: Vec<SocketId>,
    pub sent: Vec<SentDatagram>,
    pub answer_arp: bool,
    pub stall_unicast: bool,
    pending: Option<SendOutcome>,
    inbox: VecDeque<(Ipv4Address, Vec<u8>)>,
}

impl MockUdp {
    /// Queue a datagram from `source`, port 67.
    pub fn deliver(&mut self, source: Ipv4Address, payload: Vec<u8>) {
        self.inbox.push_back((source, payload));
    }
}

impl UdpChannel for MockUdp {
    type Error = Infallible;

    fn open_udp(&mut self, socket: SocketId, local_port: u16) -> Result<(), Infallible> {
        self.opened.push((socket, local_port));
        Ok(())
    }

    fn send_to(
        &mut self,
        socket: SocketId,
        dest: Ipv4Address,
        port: u16,
        payload: &[u8],
    ) -> Result<(), Infallible> {
        self.sent.push(SentDatagram {
            socket,
            dest,
            port,
            payload: payload.to_vec(),
        });
        self.pending = if dest == BROADCAST || self.answer_arp {
            Some(SendOutcome::Sent)
        } else if self.stall_unicast {
            None
        } else {
            Some(SendOutcome::TimedOut)
        };
        Ok(())
    }

    fn send_status(&mut self, _socket: SocketId) -> Result<Option<SendOutcome>, Infallible> {
        Ok(self.pending.take())
    }

    fn recv_from(
        &mut self,
        _socket: SocketId,
        buf: &mut [u8],
    ) -> Result<Option<Datagram>, Infallible> {
        Ok(self.inbox.pop_front().map(|(source, payload)| {
            let len = payload.len().min(buf.len());
            buf[..len].copy_from_slice(&payload[..len]);
            Datagram {
                source,
                port: 67,
                len,
            }
        }))
    }

    fn close(&mut self, socket: SocketId) -> Result<(), Infallible> {
        self.closed.push(socket);
        Ok(())
    }
}

// W5500 register file

/// DHCP server answering DISCOVER with an OFFER and REQUEST with an ACK
#[derive(Debug, Clone, Copy)]
pub struct DhcpServerSim {
    pub server: Ipv4Address,
    pub offer: Ipv4Address,
    pub lease_secs: u32,
}

impl DhcpServerSim {
    fn answer(&self, payload: &[u8]) -> Option<Vec<u8>> {
        let seen = Seen::parse(payload)?;
        let kind = match seen.kind {
            DhcpMessageType::Discover => DhcpMessageType::Offer,
            DhcpMessageType::Request => DhcpMessageType::Ack,
            _ => return None,
        };
        Some(server_reply(
            kind,
            seen.xid,
            &seen.mac,
            self.offer,
            self.server,
            self.lease_secs,
        ))
    }
}

/// In-progress SPI frame
#[derive(Clone, Default)]
struct Frame {
    header: Vec<u8>,
    addr: u16,
    bsb: u8,
    write: bool,
}

/// W5500 register-file emulator speaking the SPI frame protocol
///
/// Socket commands complete immediately. UDP sends are captured in
/// `sent`; `deliver` queues inbound datagrams in the RX buffer layout the
/// chip uses. With `dhcp_server` set, broadcasts to port 67 are answered
/// the way a server on the segment would.
#[derive(Clone)]
pub struct W5500Sim {
    mem: BTreeMap<(u8, u16), u8>,
    pub link_up: bool,
    /// Unicast sends end in an ARP timeout
    pub arp_timeout: bool,
    /// `Sn_IR` reads before an ARP timeout is raised
    pub arp_delay_reads: usize,
    pub dhcp_server: Option<DhcpServerSim>,
    pub software_resets: usize,
    pub phy_resets: usize,
    /// Chip-select outside a critical section, or bytes outside a frame
    pub framing_violations: usize,
    pub sent: Vec<SentDatagram>,
    critical: bool,
    frame: Option<Frame>,
    tx_rd: [u16; SOCKET_COUNT],
    rx_wr: [u16; SOCKET_COUNT],
    /// Socket waiting on ARP, with the `Sn_IR` reads left
    resolving: Option<(SocketId, usize)>,
}

impl W5500Sim {
    pub fn new() -> Self {
        let mut sim = Self {
            mem: BTreeMap::new(),
            link_up: false,
            arp_timeout: false,
            arp_delay_reads: 0,
            dhcp_server: None,
            software_resets: 0,
            phy_resets: 0,
            framing_violations: 0,
            sent: Vec::new(),
            critical: false,
            frame: None,
            tx_rd: [0; SOCKET_COUNT],
            rx_wr: [0; SOCKET_COUNT],
            resolving: None,
        };
        sim.set_reg(regs::BSB_COMMON, regs::VERSIONR, regs::CHIP_VERSION);
        sim.set_reg(regs::BSB_COMMON, regs::PHYCFGR, 0xB8);
        for socket in 0..SOCKET_COUNT as u8 {
            sim.set_regs(regs::bsb_socket(socket), regs::SN_TX_FSR, &2048u16.to_be_bytes());
        }
        sim
    }

    /// Register value as the chip would return it
    pub fn reg(&self, bsb: u8, addr: u16) -> u8 {
        let stored = self.mem.get(&(bsb, addr)).copied().unwrap_or(0);
        if bsb == regs::BSB_COMMON && addr == regs::PHYCFGR && self.link_up {
            stored | regs::PHYCFGR_LNK
        } else {
            stored
        }
    }

    pub fn regs(&self, bsb: u8, addr: u16, n: usize) -> Vec<u8> {
        (0..n as u16).map(|i| self.reg(bsb, addr + i)).collect()
    }

    /// Store without side effects.
    pub fn set_reg(&mut self, bsb: u8, addr: u16, value: u8) {
        self.mem.insert((bsb, addr), value);
    }

    pub fn set_regs(&mut self, bsb: u8, addr: u16, values: &[u8]) {
        for (i, &value) in values.iter().enumerate() {
            self.set_reg(bsb, addr.wrapping_add(i as u16), value);
        }
    }

    pub fn set_mss(&mut self, socket: SocketId, mss: u16) {
        self.set_regs(regs::bsb_socket(socket), regs::SN_MSSR, &mss.to_be_bytes());
    }

    /// Same register contents, ignoring bookkeeping counters.
    pub fn same_registers(&self, other: &W5500Sim) -> bool {
        let nonzero = |sim: &W5500Sim| -> BTreeMap<(u8, u16), u8> {
            sim.mem
                .iter()
                .filter(|&(_, &v)| v != 0)
                .map(|(&k, &v)| (k, v))
                .collect()
        };
        nonzero(self) == nonzero(other)
    }

    fn reg_u16(&self, bsb: u8, addr: u16) -> u16 {
        u16::from_be_bytes([self.reg(bsb, addr), self.reg(bsb, addr + 1)])
    }

    fn set_reg_u16(&mut self, bsb: u8, addr: u16, value: u16) {
        self.set_regs(bsb, addr, &value.to_be_bytes());
    }

    /// Queue an inbound UDP datagram on `socket`.
    pub fn deliver(&mut self, socket: SocketId, source: Ipv4Address, port: u16, payload: &[u8]) {
        let n = usize::from(socket);
        let mut record = source.to_vec();
        record.extend_from_slice(&port.to_be_bytes());
        record.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        record.extend_from_slice(payload);

        self.set_regs(regs::bsb_rx(socket), self.rx_wr[n], &record);
        self.rx_wr[n] = self.rx_wr[n].wrapping_add(record.len() as u16);
        self.update_rx_size(socket);
    }

    fn update_rx_size(&mut self, socket: SocketId) {
        let block = regs::bsb_socket(socket);
        let read = self.reg_u16(block, regs::SN_RX_RD);
        let pending = self.rx_wr[usize::from(socket)].wrapping_sub(read);
        self.set_reg_u16(block, regs::SN_RX_RSR, pending);
    }

    fn socket_command(&mut self, socket: SocketId, command: u8) {
        let block = regs::bsb_socket(socket);
        let udp = self.reg(block, regs::SN_SR) == regs::SOCK_UDP;
        match command {
            regs::SN_CR_OPEN => {
                let status = if self.reg(block, regs::SN_MR) & 0x0F == regs::SN_MR_UDP {
                    regs::SOCK_UDP
                } else {
                    0x13
                };
                self.set_reg(block, regs::SN_SR, status);
            }
            regs::SN_CR_CLOSE => {
                self.set_reg(block, regs::SN_SR, regs::SOCK_CLOSED);
                if matches!(self.resolving, Some((s, _)) if s == socket) {
                    self.resolving = None;
                }
            }
            regs::SN_CR_SEND if udp => {
                let n = usize::from(socket);
                let end = self.reg_u16(block, regs::SN_TX_WR);
                let len = end.wrapping_sub(self.tx_rd[n]);
                let payload: Vec<u8> = (0..len)
                    .map(|i| self.reg(regs::bsb_tx(socket), self.tx_rd[n].wrapping_add(i)))
                    .collect();
                self.tx_rd[n] = end;

                let mut dest = [0u8; 4];
                dest.copy_from_slice(&self.regs(block, regs::SN_DIPR, 4));
                let port = self.reg_u16(block, regs::SN_DPORT);
                let answer = match self.dhcp_server {
                    Some(server) if dest == BROADCAST && port == 67 => server.answer(&payload),
                    _ => None,
                };
                self.sent.push(SentDatagram {
                    socket,
                    dest,
                    port,
                    payload,
                });

                if self.arp_timeout && dest != BROADCAST {
                    if self.arp_delay_reads == 0 {
                        self.raise(block, interrupt::TIMEOUT);
                    } else {
                        self.resolving = Some((socket, self.arp_delay_reads));
                    }
                } else {
                    self.raise(block, interrupt::SEND_OK);
                }
                if let (Some(server), Some(reply)) = (self.dhcp_server, answer) {
                    self.deliver(socket, server.server, 67, &reply);
                }
            }
            regs::SN_CR_RECV => self.update_rx_size(socket),
            _ => {}
        }
        self.set_reg(block, regs::SN_CR, 0);
    }

    fn raise(&mut self, block: u8, event: u8) {
        let ir = self.reg(block, regs::SN_IR);
        self.set_reg(block, regs::SN_IR, ir | event);
    }

    /// Count down a pending ARP resolution on each `Sn_IR` read.
    fn on_read(&mut self, bsb: u8, addr: u16) {
        let Some((socket, left)) = self.resolving else {
            return;
        };
        let block = regs::bsb_socket(socket);
        if (bsb, addr) != (block, regs::SN_IR) {
            return;
        }
        if left <= 1 {
            self.resolving = None;
            self.raise(block, interrupt::TIMEOUT);
        } else {
            self.resolving = Some((socket, left - 1));
        }
    }

    fn store(&mut self, bsb: u8, addr: u16, value: u8) {
        if bsb == regs::BSB_COMMON {
            match addr {
                regs::MR => {
                    if value & regs::MR_RST != 0 {
                        self.software_resets += 1;
                    }
                    self.set_reg(bsb, addr, value & !regs::MR_RST);
                }
                regs::PHYCFGR => {
                    if value & regs::PHYCFGR_RST == 0 {
                        self.phy_resets += 1;
                    }
                    self.set_reg(bsb, addr, value & !regs::PHYCFGR_LNK);
                }
                regs::VERSIONR => {}
                _ => self.set_reg(bsb, addr, value),
            }
            return;
        }

        let socket_block = bsb % 4 == 1;
        let socket = (bsb - 1) / 4;
        match addr {
            regs::SN_CR if socket_block => self.socket_command(socket, value),
            regs::SN_IR if socket_block => {
                let ir = self.reg(bsb, addr);
                self.set_reg(bsb, addr, ir & !value);
            }
            _ => self.set_reg(bsb, addr, value),
        }
    }
}

impl BusAdapter for W5500Sim {
    type Error = Infallible;

    fn critical_enter(&mut self) {
        self.critical = true;
    }

    fn critical_exit(&mut self) {
        self.critical = false;
    }

    fn select(&mut self) -> Result<(), Infallible> {
        if !self.critical || self.frame.is_some() {
            self.framing_violations += 1;
        }
        self.frame = Some(Frame::default());
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), Infallible> {
        if self.frame.take().is_none() {
            self.framing_violations += 1;
        }
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Infallible> {
        let Some(frame) = self.frame.as_mut() else {
            self.framing_violations += 1;
            return Ok(());
        };
        if frame.header.len() < 3 {
            frame.header.push(byte);
            if frame.header.len() == 3 {
                frame.addr = u16::from_be_bytes([frame.header[0], frame.header[1]]);
                frame.bsb = frame.header[2] >> 3;
                frame.write = frame.header[2] & regs::RWB_WRITE != 0;
            }
            return Ok(());
        }
        if !frame.write {
            self.framing_violations += 1;
            return Ok(());
        }
        let (bsb, addr) = (frame.bsb, frame.addr);
        frame.addr = addr.wrapping_add(1);
        self.store(bsb, addr, byte);
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Infallible> {
        let target = match self.frame.as_mut() {
            Some(frame) if frame.header.len() == 3 && !frame.write => {
                let addr = frame.addr;
                frame.addr = addr.wrapping_add(1);
                Some((frame.bsb, addr))
            }
            _ => None,
        };
        match target {
            Some((bsb, addr)) => {
                self.on_read(bsb, addr);
                Ok(self.reg(bsb, addr))
            }
            None => {
                self.framing_violations += 1;
                Ok(0)
            }
        }
    }
}
