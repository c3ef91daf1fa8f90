
use std::net::Ipv4Addr;

use thiserror::Error;

/// Length of an IPv4 header without options.
pub const IPV4_HDR_LEN: usize = 20;

pub const PROTO_ICMP: u8 = 0x01;
pub const PROTO_TCP: u8 = 0x06;

/// ICMP message type of a ping request.
pub const ICMP_ECHO_REQUEST: u8 = 8;

const VERSION_OFFSET: usize = 0;
const PROTO_OFFSET: usize = 9;
const SRC_OFFSET: usize = 12;
const DST_OFFSET: usize = 16;
// Relative to the start of the transport header.
const TCP_DST_PORT_OFFSET: usize = 2;
const ICMP_TYPE_OFFSET: usize = 0;

#[non_exhaustive]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("packet of {len} bytes is too short, {needed} needed")]
    Truncated { needed: usize, len: usize },
    #[error("unsupported IP version {version}")]
    NotIpv4 { version: u8 },
}

/// IP protocol carried by a datagram, as far as the filter cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Icmp,
    Tcp,
    Other(u8),
}

impl From<u8> for Protocol {
    fn from(value: u8) -> Self {
        match value {
            PROTO_ICMP => Protocol::Icmp,
            PROTO_TCP => Protocol::Tcp,
            other => Protocol::Other(other),
        }
    }
}

impl From<Protocol> for u8 {
    fn from(value: Protocol) -> Self {
        match value {
            Protocol::Icmp => PROTO_ICMP,
            Protocol::Tcp => PROTO_TCP,
            Protocol::Other(other) => other,
        }
    }
}

/// Read-only view over a raw IPv4 datagram.
///
/// Fields are read at fixed offsets; the transport header is assumed to start
/// right after a 20 byte IP header. Only the header length is validated up
/// front, transport fields are checked when they are accessed.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Packet<'a> {
    data: &'a [u8],
}

impl<'a> Ipv4Packet<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, HeaderError> {
        if data.len() < IPV4_HDR_LEN {
            return Err(HeaderError::Truncated {
                needed: IPV4_HDR_LEN,
                len: data.len(),
            });
        }
        Ok(Self { data })
    }

    /// Version nibble as found in the header. Not checked by [parse](Self::parse).
    pub fn version(&self) -> u8 {
        self.data[VERSION_OFFSET] >> 4
    }

    /// Fails with [NotIpv4](HeaderError::NotIpv4) unless the version nibble is 4.
    pub fn ensure_ipv4(&self) -> Result<(), HeaderError> {
        match self.version() {
            4 => Ok(()),
            version => Err(HeaderError::NotIpv4 { version }),
        }
    }

    pub fn source(&self) -> Ipv4Addr {
        self.addr_at(SRC_OFFSET)
    }

    pub fn destination(&self) -> Ipv4Addr {
        self.addr_at(DST_OFFSET)
    }

    pub fn protocol(&self) -> Protocol {
        Protocol::from(self.data[PROTO_OFFSET])
    }

    pub fn tcp_destination_port(&self) -> Result<u16, HeaderError> {
        let [hi, lo] = self.transport_bytes::<2>(TCP_DST_PORT_OFFSET)?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    pub fn icmp_type(&self) -> Result<u8, HeaderError> {
        let [ty] = self.transport_bytes::<1>(ICMP_TYPE_OFFSET)?;
        Ok(ty)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn addr_at(&self, offset: usize) -> Ipv4Addr {
        Ipv4Addr::new(
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        )
    }

    fn transport_bytes<const N: usize>(&self, offset: usize) -> Result<[u8; N], HeaderError> {
        let start = IPV4_HDR_LEN + offset;
        let end = start + N;
        let field = self.data.get(start..end).ok_or(HeaderError::Truncated {
            needed: end,
            len: self.data.len(),
        })?;
        let mut out = [0u8; N];
        out.copy_from_slice(field);
        Ok(out)
    }
}
