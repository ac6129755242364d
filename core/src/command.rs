//! `start` and `ifconfig` command handlers
//!
//! Argument tokenizing is left to the caller; handlers take the positional
//! arguments already split.

use core::fmt;

use embedded_hal::delay::DelayNs as SpinDelay;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use wiz_hal::{AddressMode, BusAdapter, Clock, Ipv4Address, MacAddress, NetworkInfo};

use crate::bringup::{Bringup, Platform};
use crate::chip::Attach;
use crate::config::DEFAULT_MAC_STR;
use crate::error::BringupError;
use crate::fmt::Debug2Format;
use crate::identity::Resolve;

/// Command failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Too many arguments
    Usage,
    /// `ifconfig` before the chip was attached
    NotStarted,
    Bringup(BringupError),
}

impl CommandError {
    /// Process-style exit status, never 0
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Usage => 2,
            Self::NotStarted | Self::Bringup(_) => 1,
        }
    }
}

impl From<BringupError> for CommandError {
    fn from(e: BringupError) -> Self {
        CommandError::Bringup(e)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage => write!(f, "usage: start [xx:xx:xx:xx:xx:xx]"),
            Self::NotStarted => write!(f, "network not started"),
            Self::Bringup(e) => write!(f, "{}", e),
        }
    }
}

impl core::error::Error for CommandError {}

/// Exit status of a command result: 0 on success.
pub fn exit_code<T>(result: &Result<T, CommandError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.exit_code(),
    }
}

/// `start [mac]`: set the MAC (default when absent) and run bring-up.
pub async fn start<B, C, R, P, S, Y, K>(
    bringup: &mut Bringup<B, C, R>,
    platform: &mut Platform<P, S, Y, K>,
    args: &[&str],
) -> Result<(), CommandError>
where
    B: BusAdapter,
    C: Attach<B>,
    R: Resolve<C>,
    P: OutputPin,
    S: SpinDelay,
    Y: DelayNs,
    K: Clock,
{
    let mac = match args {
        [] => DEFAULT_MAC_STR,
        [mac] => *mac,
        _ => {
            warn!("start: expected at most one argument, got {}", args.len());
            return Err(CommandError::Usage);
        }
    };
    bringup.set_mac(mac)?;
    bringup.run(platform).await?;
    Ok(())
}

/// Committed interface configuration as reported by `ifconfig`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceReport {
    /// NUL-padded chip name
    pub chip_id: [u8; 6],
    /// Maximum segment size of socket 0
    pub mtu: u16,
    pub info: NetworkInfo,
}

impl InterfaceReport {
    pub fn chip_name(&self) -> &str {
        let len = self
            .chip_id
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.chip_id.len());
        core::str::from_utf8(&self.chip_id[..len]).unwrap_or("?")
    }
}

struct Mac<'a>(&'a MacAddress);

impl fmt::Display for Mac<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

struct Ip<'a>(&'a Ipv4Address);

impl fmt::Display for Ip<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl fmt::Display for InterfaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.info.mode {
            AddressMode::Static => "static",
            AddressMode::Dhcp => "dhcp",
        };
        writeln!(f, "{} mtu {} ({})", self.chip_name(), self.mtu, mode)?;
        writeln!(f, "  ether   {}", Mac(&self.info.mac))?;
        writeln!(f, "  inet    {}", Ip(&self.info.ip))?;
        writeln!(f, "  netmask {}", Ip(&self.info.subnet_mask))?;
        writeln!(f, "  gateway {}", Ip(&self.info.gateway))?;
        write!(f, "  dns     {}", Ip(&self.info.dns))
    }
}

/// `ifconfig`: read the committed configuration back from the chip.
pub fn ifconfig<B, C, R>(bringup: &mut Bringup<B, C, R>) -> Result<InterfaceReport, CommandError>
where
    B: BusAdapter,
    C: Attach<B>,
    R: Resolve<C>,
{
    let chip = bringup.chip_mut().ok_or(CommandError::NotStarted)?;
    let read = |e: C::Error| {
        error!("ifconfig read failed: {}", Debug2Format(&e));
        CommandError::Bringup(BringupError::Bus)
    };
    let chip_id = chip.chip_id().map_err(read)?;
    let mtu = chip.max_segment_size(0).map_err(read)?;
    let info = chip.network_info().map_err(read)?;
    Ok(InterfaceReport { chip_id, mtu, info })
}
