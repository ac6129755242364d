//! Network identity record shared by chips, resolvers and the orchestrator

/// 6-byte Ethernet hardware address
pub type MacAddress = [u8; 6];

/// 4-byte IPv4 address in network order
pub type Ipv4Address = [u8; 4];

/// How the identity in a [`NetworkInfo`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressMode {
    /// Fixed addresses from build-time configuration
    #[default]
    Static,
    /// Addresses leased from a DHCP server
    Dhcp,
}

/// Network identity of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkInfo {
    /// Source hardware address
    pub mac: MacAddress,
    /// Source IP address
    pub ip: Ipv4Address,
    /// Default gateway
    pub gateway: Ipv4Address,
    /// Subnet mask
    pub subnet_mask: Ipv4Address,
    /// DNS server
    pub dns: Ipv4Address,
    /// Origin of the addresses above
    pub mode: AddressMode,
}

impl NetworkInfo {
    /// Zeroed identity carrying only a hardware address
    pub const fn with_mac(mac: MacAddress) -> Self {
        Self {
            mac,
            ip: [0; 4],
            gateway: [0; 4],
            subnet_mask: [0; 4],
            dns: [0; 4],
            mode: AddressMode::Static,
        }
    }
}
