use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::cidr::LocalNet;

/// Rules applied to packets while the [Firewall](crate::Firewall) is in [Filter](crate::Mode::Filter) mode.
///
/// Built once, usually by loading a configuration (see [RuleSet::load]), and
/// only read afterwards.
///
/// # Example
/// ```
/// # use ipfilter::RuleSet;
/// let rules = RuleSet::new("192.168.1.0/24".parse().unwrap())
///     .with_blocked_ping()
///     .with_blocked_tcp_port(23)
///     .with_blocked_address("10.0.0.5".parse().unwrap());
/// assert_eq!(rules.blocked_tcp_ports(), &[23]);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RuleSet {
    pub(crate) local_net: LocalNet,
    pub(crate) block_inbound_echo_request: bool,
    pub(crate) blocked_tcp_ports: Vec<u16>,
    pub(crate) blocked_addresses: Vec<Ipv4Addr>,
}

impl RuleSet {
    /// Creates a `RuleSet` for the given local network that blocks nothing.
    pub fn new(local_net: Ipv4Net) -> Self {
        Self::with_local_net(local_net.into())
    }

    pub(crate) fn with_local_net(local_net: LocalNet) -> Self {
        Self {
            local_net,
            block_inbound_echo_request: false,
            blocked_tcp_ports: Vec::new(),
            blocked_addresses: Vec::new(),
        }
    }

    /// Drops echo requests coming from outside the local network.
    pub fn with_blocked_ping(self) -> Self {
        Self {
            block_inbound_echo_request: true,
            ..self
        }
    }

    /// Drops inbound TCP segments to `port`.
    pub fn with_blocked_tcp_port(mut self, port: u16) -> Self {
        self.blocked_tcp_ports.push(port);
        self
    }

    /// Drops every packet from or to `addr`, whatever its direction.
    pub fn with_blocked_address(mut self, addr: Ipv4Addr) -> Self {
        self.blocked_addresses.push(addr);
        self
    }

    pub fn local_net(&self) -> &LocalNet {
        &self.local_net
    }

    pub fn blocks_inbound_echo_request(&self) -> bool {
        self.block_inbound_echo_request
    }

    pub fn blocked_tcp_ports(&self) -> &[u16] {
        &self.blocked_tcp_ports
    }

    pub fn blocked_addresses(&self) -> &[Ipv4Addr] {
        &self.blocked_addresses
    }

    pub(crate) fn is_blocked_address(&self, addr: Ipv4Addr) -> bool {
        self.blocked_addresses.contains(&addr)
    }

    pub(crate) fn is_blocked_tcp_port(&self, port: u16) -> bool {
        self.blocked_tcp_ports.contains(&port)
    }
}
