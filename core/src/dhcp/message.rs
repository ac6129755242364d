//! DHCP messages on top of `smoltcp::wire`
//!
//! Client messages are built as a [`DhcpRepr`] and emitted into a
//! fixed-capacity buffer; server replies are checked and parsed by smoltcp,
//! then reduced to the fields the client state machine needs.

use heapless::Vec;
use smoltcp::wire::{
    DhcpMessageType, DhcpPacket, DhcpRepr, EthernetAddress, Ipv4Address as WireAddress,
    DHCP_CLIENT_PORT, DHCP_SERVER_PORT,
};
use wiz_hal::{Ipv4Address, MacAddress};

pub const SERVER_PORT: u16 = DHCP_SERVER_PORT;
pub const CLIENT_PORT: u16 = DHCP_CLIENT_PORT;

/// Largest message a client must accept
pub const MAX_MESSAGE: usize = 576;

/// Subnet mask, router, DNS
const PARAMETERS: &[u8] = &[1, 3, 6];

pub type Packet = Vec<u8, MAX_MESSAGE>;

/// Client message
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub kind: DhcpMessageType,
    pub xid: u32,
    pub mac: MacAddress,
    /// `ciaddr`; set only while renewing a bound lease
    pub client_ip: Ipv4Address,
    pub requested_ip: Option<Ipv4Address>,
    pub server_id: Option<Ipv4Address>,
}

impl Request {
    pub const fn new(kind: DhcpMessageType, xid: u32, mac: MacAddress) -> Self {
        Self {
            kind,
            xid,
            mac,
            client_ip: [0; 4],
            requested_ip: None,
            server_id: None,
        }
    }

    /// A client without an address needs the server to broadcast back.
    pub fn wants_broadcast(&self) -> bool {
        self.client_ip == [0; 4]
    }

    /// Serialize; `None` only if the message overflows [`MAX_MESSAGE`].
    pub fn encode(&self) -> Option<Packet> {
        let repr = DhcpRepr {
            message_type: self.kind,
            transaction_id: self.xid,
            secs: 0,
            client_hardware_address: EthernetAddress(self.mac),
            client_ip: WireAddress::from(self.client_ip),
            your_ip: WireAddress::UNSPECIFIED,
            server_ip: WireAddress::UNSPECIFIED,
            router: None,
            subnet_mask: None,
            relay_agent_ip: WireAddress::UNSPECIFIED,
            broadcast: self.wants_broadcast(),
            requested_ip: self.requested_ip.map(WireAddress::from),
            client_identifier: Some(EthernetAddress(self.mac)),
            server_identifier: self.server_id.map(WireAddress::from),
            parameter_request_list: (self.kind != DhcpMessageType::Decline).then_some(PARAMETERS),
            dns_servers: None,
            max_size: None,
            lease_duration: None,
            renew_duration: None,
            rebind_duration: None,
            additional_options: &[],
        };

        let mut out = Packet::new();
        out.resize(repr.buffer_len(), 0).ok()?;
        repr.emit(&mut DhcpPacket::new_unchecked(&mut out[..])).ok()?;
        Some(out)
    }
}

/// Server message addressed to this client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub kind: DhcpMessageType,
    pub xid: u32,
    pub your_ip: Ipv4Address,
    pub server_id: Option<Ipv4Address>,
    pub subnet_mask: Option<Ipv4Address>,
    pub router: Option<Ipv4Address>,
    /// First DNS server listed
    pub dns: Option<Ipv4Address>,
    pub lease_time_secs: Option<u32>,
}

impl Reply {
    /// Parse `msg`, rejecting anything that is not a server reply for `mac`.
    pub fn decode(msg: &[u8], mac: &MacAddress) -> Option<Self> {
        let packet = DhcpPacket::new_checked(msg).ok()?;
        let repr = DhcpRepr::parse(&packet).ok()?;

        let from_server = matches!(
            repr.message_type,
            DhcpMessageType::Offer | DhcpMessageType::Ack | DhcpMessageType::Nak
        );
        if !from_server || repr.client_hardware_address != EthernetAddress(*mac) {
            return None;
        }

        Some(Self {
            kind: repr.message_type,
            xid: repr.transaction_id,
            your_ip: repr.your_ip.octets(),
            server_id: repr.server_identifier.map(|ip| ip.octets()),
            subnet_mask: repr.subnet_mask.map(|ip| ip.octets()),
            router: repr.router.map(|ip| ip.octets()),
            dns: repr
                .dns_servers
                .as_ref()
                .and_then(|servers| servers.first())
                .map(|ip| ip.octets()),
            lease_time_secs: repr.lease_duration,
        })
    }
}

/// Fields of a client message, as a server would see them
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Seen {
    pub kind: DhcpMessageType,
    pub xid: u32,
    pub mac: MacAddress,
    pub broadcast: bool,
    pub client_ip: Ipv4Address,
    pub requested_ip: Option<Ipv4Address>,
    pub server_id: Option<Ipv4Address>,
    pub client_id: Option<MacAddress>,
    pub parameters: Option<std::vec::Vec<u8>>,
}

#[cfg(test)]
impl Seen {
    pub(crate) fn parse(msg: &[u8]) -> Option<Self> {
        let packet = DhcpPacket::new_checked(msg).ok()?;
        let repr = DhcpRepr::parse(&packet).ok()?;
        Some(Self {
            kind: repr.message_type,
            xid: repr.transaction_id,
            mac: repr.client_hardware_address.0,
            broadcast: repr.broadcast,
            client_ip: repr.client_ip.octets(),
            requested_ip: repr.requested_ip.map(|ip| ip.octets()),
            server_id: repr.server_identifier.map(|ip| ip.octets()),
            client_id: repr.client_identifier.map(|id| id.0),
            parameters: repr.parameter_request_list.map(|list| list.to_vec()),
        })
    }
}

/// Server-side encoder for tests. Router is the server itself; DNS lists
/// the server, then 8.8.8.8.
#[cfg(test)]
pub(crate) fn server_reply(
    kind: DhcpMessageType,
    xid: u32,
    mac: &MacAddress,
    your_ip: Ipv4Address,
    server: Ipv4Address,
    lease_time_secs: u32,
) -> std::vec::Vec<u8> {
    let server = WireAddress::from(server);
    let repr = DhcpRepr {
        message_type: kind,
        transaction_id: xid,
        secs: 0,
        client_hardware_address: EthernetAddress(*mac),
        client_ip: WireAddress::UNSPECIFIED,
        your_ip: WireAddress::from(your_ip),
        server_ip: server,
        router: Some(server),
        subnet_mask: Some(WireAddress::new(255, 255, 255, 0)),
        relay_agent_ip: WireAddress::UNSPECIFIED,
        broadcast: false,
        requested_ip: None,
        client_identifier: None,
        server_identifier: Some(server),
        parameter_request_list: None,
        dns_servers: heapless::Vec::from_slice(&[server, WireAddress::new(8, 8, 8, 8)]).ok(),
        max_size: None,
        lease_duration: Some(lease_time_secs),
        renew_duration: None,
        rebind_duration: None,
        additional_options: &[],
    };
    let mut out = std::vec![0u8; repr.buffer_len()];
    repr.emit(&mut DhcpPacket::new_unchecked(&mut out[..])).unwrap();
    out
}
