//! Minimal DHCP client
//!
//! DISCOVER/OFFER/REQUEST/ACK exchange over one UDP socket, driven by
//! [`DhcpEngine::step`]. Before a granted address is reported the client
//! sends a datagram to it: if the chip's ARP request is answered, another
//! host already owns the address and the lease is declined. Renewals are
//! unicast to the granting server from the leased address.
//!
//! Sends never block. The chip reports completion through
//! [`UdpChannel::send_status`], which the next step polls against a clock
//! deadline.

pub(crate) mod message;

use smoltcp::wire::DhcpMessageType;
use wiz_hal::{
    DhcpEngine, DhcpListener, DhcpStatus, Duration, Instant, Ipv4Address, Lease, MacAddress,
    SendOutcome, SocketId, UdpChannel,
};

use crate::fmt::Debug2Format;
use message::{Reply, Request, CLIENT_PORT, MAX_MESSAGE, SERVER_PORT};

const BROADCAST: Ipv4Address = [255, 255, 255, 255];

/// Destination port of the address conflict check; nothing needs to listen
const CHECK_PORT: u16 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    /// Socket not open or exchange restarting
    Init,
    /// DISCOVER sent, waiting for an OFFER
    Selecting,
    /// REQUEST sent, waiting for the ACK
    Requesting,
    /// ACK received, waiting to learn whether the address is taken
    Checking,
    Bound,
    /// REQUEST unicast from `Bound` to extend the lease
    Renewing,
    Stopped,
}

/// Retransmission policy
#[derive(Debug, Clone, Copy)]
pub struct ClientTiming {
    /// Wait for a reply before resending
    pub retry_after: Duration,
    /// Resends per phase before giving up
    pub max_retries: u8,
    /// Wait for the chip to finish one send. Must cover its ARP retry
    /// window (1.8 s with W5500 reset values).
    pub send_timeout: Duration,
}

impl Default for ClientTiming {
    fn default() -> Self {
        Self {
            retry_after: Duration::millis(1_000),
            max_retries: 3,
            send_timeout: Duration::millis(3_000),
        }
    }
}

/// DHCP client engine for any [`UdpChannel`]
pub struct DhcpClient {
    timing: ClientTiming,
    socket: SocketId,
    mac: MacAddress,
    xid: u32,
    state: State,
    retries: u8,
    deadline: Instant,
    /// Deadline of the send the chip is still working on
    sending: Option<Instant>,
    offer: Option<(Ipv4Address, Ipv4Address)>,
    /// Acknowledged lease and its server, while `Checking`
    candidate: Option<(Lease, Option<Ipv4Address>)>,
    lease: Lease,
    /// Server that granted `lease`
    server: Ipv4Address,
    renew_at: Option<Instant>,
    assigned: bool,
}

impl Default for DhcpClient {
    fn default() -> Self {
        Self::new(ClientTiming::default())
    }
}

impl DhcpClient {
    pub const fn new(timing: ClientTiming) -> Self {
        Self {
            timing,
            socket: 0,
            mac: [0; 6],
            xid: 0,
            state: State::Stopped,
            retries: 0,
            deadline: Instant::from_ticks(0),
            sending: None,
            offer: None,
            candidate: None,
            lease: Lease {
                ip: [0; 4],
                gateway: [0; 4],
                subnet_mask: [0; 4],
                dns: [0; 4],
                lease_time_secs: 0,
            },
            server: [0; 4],
            renew_at: None,
            assigned: false,
        }
    }

    fn transition(&mut self, state: State) {
        trace!("DHCP client: {} -> {}", self.state, state);
        self.state = state;
    }

    fn fail(&mut self) -> DhcpStatus {
        self.transition(State::Stopped);
        DhcpStatus::Failed
    }

    /// Hand `payload` to the chip and start the completion deadline.
    fn queue<C: UdpChannel>(
        &mut self,
        chip: &mut C,
        dest: Ipv4Address,
        port: u16,
        payload: &[u8],
        now: Instant,
    ) -> bool {
        match chip.send_to(self.socket, dest, port, payload) {
            Ok(()) => {
                self.sending = Some(now + self.timing.send_timeout);
                true
            }
            Err(e) => {
                warn!("DHCP send failed: {}", Debug2Format(&e));
                false
            }
        }
    }

    fn send<C: UdpChannel>(
        &mut self,
        chip: &mut C,
        request: &Request,
        dest: Ipv4Address,
        now: Instant,
    ) -> bool {
        let Some(packet) = request.encode() else {
            error!("DHCP message does not fit");
            return false;
        };
        self.queue(chip, dest, SERVER_PORT, &packet, now)
    }

    fn send_discover<C: UdpChannel>(&mut self, chip: &mut C, now: Instant) -> DhcpStatus {
        self.offer = None;
        let discover = Request::new(DhcpMessageType::Discover, self.xid, self.mac);
        if !self.send(chip, &discover, BROADCAST, now) {
            return self.fail();
        }
        self.deadline = now + self.timing.retry_after;
        self.transition(State::Selecting);
        DhcpStatus::Running
    }

    fn send_request<C: UdpChannel>(&mut self, chip: &mut C, now: Instant) -> DhcpStatus {
        let Some((ip, server)) = self.offer else {
            return self.send_discover(chip, now);
        };
        let request = Request {
            requested_ip: Some(ip),
            server_id: Some(server),
            ..Request::new(DhcpMessageType::Request, self.xid, self.mac)
        };
        if !self.send(chip, &request, BROADCAST, now) {
            return self.fail();
        }
        self.deadline = now + self.timing.retry_after;
        DhcpStatus::Running
    }

    /// RENEWING per RFC 2131 4.3.2: `ciaddr` set, no requested address or
    /// server identifier, unicast to the server that granted the lease.
    fn send_renewal<C: UdpChannel>(&mut self, chip: &mut C, now: Instant) -> DhcpStatus {
        let request = Request {
            client_ip: self.lease.ip,
            ..Request::new(DhcpMessageType::Request, self.xid, self.mac)
        };
        if !self.send(chip, &request, self.server, now) {
            return self.fail();
        }
        self.deadline = now + self.timing.retry_after;
        DhcpStatus::Running
    }

    /// Drop the current exchange and start over with a fresh transaction id.
    fn restart(&mut self) {
        self.xid = self.xid.wrapping_add(1);
        self.retries = 0;
        self.offer = None;
        self.candidate = None;
        self.transition(State::Init);
    }

    /// Take the next datagram that is a reply to the current transaction.
    fn receive<C: UdpChannel>(&mut self, chip: &mut C) -> Option<Reply> {
        let mut buf = [0u8; MAX_MESSAGE];
        loop {
            match chip.recv_from(self.socket, &mut buf) {
                Ok(Some(dgram)) => {
                    match Reply::decode(&buf[..dgram.len], &self.mac) {
                        Some(reply) if reply.xid == self.xid => return Some(reply),
                        _ => trace!("Ignoring datagram from {}", dgram.source),
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    warn!("DHCP receive failed: {}", Debug2Format(&e));
                    return None;
                }
            }
        }
    }

    /// Resend on deadline expiry; give up after the retry budget.
    fn on_silence<C: UdpChannel>(&mut self, chip: &mut C, now: Instant) -> DhcpStatus {
        if now < self.deadline {
            return DhcpStatus::Running;
        }
        if self.retries >= self.timing.max_retries {
            warn!("DHCP server not answering");
            return self.fail();
        }
        self.retries += 1;
        debug!("DHCP retransmit #{}", self.retries);
        match self.state {
            State::Selecting => self.send_discover(chip, now),
            State::Renewing => self.send_renewal(chip, now),
            _ => self.send_request(chip, now),
        }
    }

    /// Check on the last queued send. `None` means the step ends here.
    fn poll_send<C: UdpChannel>(
        &mut self,
        chip: &mut C,
        now: Instant,
        listener: &mut dyn DhcpListener,
    ) -> Option<DhcpStatus> {
        let deadline = self.sending?;
        let in_use = match chip.send_status(self.socket) {
            Ok(None) if now < deadline => return Some(DhcpStatus::Running),
            Ok(None) => {
                warn!("Send on socket {} never completed, restarting", self.socket);
                self.sending = None;
                self.restart();
                return Some(DhcpStatus::Running);
            }
            Ok(Some(outcome)) => outcome == SendOutcome::Sent,
            Err(e) => {
                warn!("DHCP send status failed: {}", Debug2Format(&e));
                false
            }
        };
        self.sending = None;
        if self.state == State::Checking {
            return Some(self.on_checked(chip, in_use, now, listener));
        }
        None
    }

    fn on_ack<C: UdpChannel>(
        &mut self,
        chip: &mut C,
        reply: &Reply,
        now: Instant,
        listener: &mut dyn DhcpListener,
    ) -> DhcpStatus {
        let lease = Lease {
            ip: reply.your_ip,
            gateway: reply.router.unwrap_or_default(),
            subnet_mask: reply.subnet_mask.unwrap_or_default(),
            dns: reply.dns.unwrap_or_default(),
            lease_time_secs: reply.lease_time_secs.unwrap_or(0),
        };
        let new_address = !self.assigned || lease.ip != self.lease.ip;
        if !new_address {
            return self.bind(lease, reply.server_id, now, listener);
        }

        // Any host answering ARP for the address already owns it
        if !self.queue(chip, lease.ip, CHECK_PORT, &lease.ip, now) {
            return self.bind(lease, reply.server_id, now, listener);
        }
        self.candidate = Some((lease, reply.server_id));
        self.transition(State::Checking);
        DhcpStatus::Running
    }

    fn on_checked<C: UdpChannel>(
        &mut self,
        chip: &mut C,
        in_use: bool,
        now: Instant,
        listener: &mut dyn DhcpListener,
    ) -> DhcpStatus {
        let Some((lease, server_id)) = self.candidate.take() else {
            self.restart();
            return DhcpStatus::Running;
        };
        if !in_use {
            return self.bind(lease, server_id, now, listener);
        }

        warn!("Address {} already in use", lease.ip);
        let decline = Request {
            requested_ip: Some(lease.ip),
            server_id,
            ..Request::new(DhcpMessageType::Decline, self.xid, self.mac)
        };
        self.send(chip, &decline, BROADCAST, now);
        listener.on_conflict();
        self.restart();
        DhcpStatus::Running
    }

    fn bind(
        &mut self,
        lease: Lease,
        server_id: Option<Ipv4Address>,
        now: Instant,
        listener: &mut dyn DhcpListener,
    ) -> DhcpStatus {
        self.renew_at = match lease.lease_time_secs {
            0 | u32::MAX => None,
            secs => Some(now + Duration::secs(u64::from(secs / 2))),
        };
        self.retries = 0;
        self.transition(State::Bound);

        let status = if !self.assigned {
            listener.on_assign(&lease);
            DhcpStatus::Assigned
        } else if lease.ip != self.lease.ip {
            listener.on_change(&lease);
            DhcpStatus::Changed
        } else {
            DhcpStatus::Leased
        };
        self.assigned = true;
        self.lease = lease;
        self.server = server_id.unwrap_or(lease.gateway);
        status
    }
}

impl<C: UdpChannel> DhcpEngine<C> for DhcpClient {
    fn configure(&mut self, socket: SocketId, mac: MacAddress) {
        self.socket = socket;
        self.mac = mac;
        self.xid = u32::from_be_bytes([mac[2], mac[3], mac[4], mac[5]]) ^ 0x4443_0000;
        self.lease = Lease::default();
        self.server = [0; 4];
        self.assigned = false;
        self.renew_at = None;
        self.sending = None;
        self.restart();
    }

    fn step(&mut self, chip: &mut C, now: Instant, listener: &mut dyn DhcpListener) -> DhcpStatus {
        if self.state == State::Stopped {
            return DhcpStatus::Stopped;
        }
        if let Some(status) = self.poll_send(chip, now, listener) {
            return status;
        }

        match self.state {
            State::Stopped => DhcpStatus::Stopped,
            State::Init => {
                if let Err(e) = chip.open_udp(self.socket, CLIENT_PORT) {
                    error!("DHCP socket open failed: {}", Debug2Format(&e));
                    return self.fail();
                }
                self.send_discover(chip, now)
            }
            State::Selecting => match self.receive(chip) {
                Some(reply) if reply.kind == DhcpMessageType::Offer => {
                    debug!("DHCP offer {}", reply.your_ip);
                    let server = reply.server_id.unwrap_or_default();
                    self.offer = Some((reply.your_ip, server));
                    self.retries = 0;
                    self.transition(State::Requesting);
                    self.send_request(chip, now)
                }
                _ => self.on_silence(chip, now),
            },
            State::Requesting | State::Renewing => match self.receive(chip) {
                Some(reply) if reply.kind == DhcpMessageType::Ack => {
                    self.on_ack(chip, &reply, now, listener)
                }
                Some(reply) if reply.kind == DhcpMessageType::Nak => {
                    warn!("DHCP NAK, restarting");
                    self.restart();
                    DhcpStatus::Running
                }
                _ => self.on_silence(chip, now),
            },
            // Lost track of the conflict check send
            State::Checking => {
                self.restart();
                DhcpStatus::Running
            }
            State::Bound => match self.renew_at {
                Some(at) if now >= at => {
                    debug!("Renewing lease on {}", self.lease.ip);
                    self.retries = 0;
                    self.transition(State::Renewing);
                    self.send_renewal(chip, now)
                }
                _ => DhcpStatus::Leased,
            },
        }
    }

    fn stop(&mut self, chip: &mut C) {
        if let Err(e) = chip.close(self.socket) {
            warn!("DHCP socket close failed: {}", Debug2Format(&e));
        }
        self.sending = None;
        self.candidate = None;
        self.transition(State::Stopped);
    }

    fn lease(&self) -> Lease {
        self.lease
    }
}
