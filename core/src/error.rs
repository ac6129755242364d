//! Bring-up error types

/// Malformed MAC or IPv4 address string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressFormatError {
    /// Separator split produced the wrong number of tokens
    TokenCount { expected: u8, found: u8 },
    /// A token is empty, too long, or has a non-digit character
    InvalidOctet,
}

impl core::fmt::Display for AddressFormatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TokenCount { expected, found } => {
                write!(f, "expected {} octets, found {}", expected, found)
            }
            Self::InvalidOctet => write!(f, "invalid octet"),
        }
    }
}

impl core::error::Error for AddressFormatError {}

/// Fatal bring-up failures
///
/// Every variant aborts the pipeline; the orchestrator logs it once and
/// leaves the readiness flag unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringupError {
    /// Bus registration or reset/chip-select pin setup failed
    BusInit,
    /// The chip rejected initialization or the partition table
    ChipInit,
    /// No physical link within the timeout
    LinkTimeout { elapsed_ms: u64 },
    /// Malformed MAC or IPv4 string
    AddressFormat(AddressFormatError),
    /// DHCP negotiation did not finish in time
    DhcpTimeout,
    /// DHCP negotiation reported failure
    DhcpFailed,
    /// Another host answered for the leased address
    AddressConflict,
    /// A register access failed while committing configuration
    Bus,
}

impl From<AddressFormatError> for BringupError {
    fn from(e: AddressFormatError) -> Self {
        BringupError::AddressFormat(e)
    }
}

impl core::fmt::Display for BringupError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BusInit => write!(f, "Bus or pin initialization failed"),
            Self::ChipInit => write!(f, "Chip initialization failed"),
            Self::LinkTimeout { elapsed_ms } => {
                write!(f, "PHY link timeout after {} ms", elapsed_ms)
            }
            Self::AddressFormat(e) => write!(f, "Malformed address: {}", e),
            Self::DhcpTimeout => write!(f, "DHCP timeout"),
            Self::DhcpFailed => write!(f, "DHCP failed"),
            Self::AddressConflict => write!(f, "IP address conflict"),
            Self::Bus => write!(f, "Register access failed"),
        }
    }
}

// Implement core::error::Error for no_std compatibility
impl core::error::Error for BringupError {}
