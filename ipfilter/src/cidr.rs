
use std::{fmt, net::Ipv4Addr, str::FromStr};

use ipnet::{AddrParseError, Ipv4Net};

/// Mask with the `prefix` high-order bits set.
///
/// Prefixes past 32 saturate to a full mask.
pub fn mask_prefix(prefix: u8) -> u32 {
    !(u32::MAX.checked_shr(prefix.into()).unwrap_or_default())
}

/// The network the filter protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalNet {
    addr: u32,
    mask: u32,
}

impl LocalNet {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Self {
        Self {
            addr: addr.into(),
            mask: mask_prefix(prefix),
        }
    }

    /// Address as configured, host bits included.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr.into()
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn prefix(&self) -> u8 {
        self.mask.leading_ones() as u8
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(ip) & self.mask) == (self.addr & self.mask)
    }

    /// Traffic entering the network from outside: destination inside, source outside.
    pub fn is_inbound(&self, source: Ipv4Addr, destination: Ipv4Addr) -> bool {
        self.contains(destination) && !self.contains(source)
    }
}

impl fmt::Display for LocalNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr(), self.prefix())
    }
}

impl From<Ipv4Net> for LocalNet {
    fn from(net: Ipv4Net) -> Self {
        Self::new(net.addr(), net.prefix_len())
    }
}

impl FromStr for LocalNet {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Net>().map(Self::from)
    }
}
