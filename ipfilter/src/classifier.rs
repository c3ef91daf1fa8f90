
use ipfilter_common::{Action, HeaderError, Ipv4Packet, Protocol, ICMP_ECHO_REQUEST};
use tracing::debug;

use crate::RuleSet;

/// Decides whether `packet` goes through under `rules`.
///
/// Evaluation order:
/// 1. A source or destination in the blocked addresses blocks, whatever the direction.
/// 2. Anything that isn't inbound is allowed.
/// 3. Inbound ICMP echo requests are blocked if ping blocking is on.
/// 4. Inbound TCP to a blocked port is blocked.
///
/// Other inbound protocols are allowed. A packet too short for the fields a
/// rule has to read is blocked. The version nibble is not looked at.
pub fn classify(rules: &RuleSet, packet: &[u8]) -> Action {
    match inspect(rules, packet) {
        Ok(action) => action,
        Err(e) => {
            debug!(len = packet.len(), "blocking uninspectable packet: {e}");
            Action::Block
        }
    }
}

fn inspect(rules: &RuleSet, packet: &[u8]) -> Result<Action, HeaderError> {
    let packet = Ipv4Packet::parse(packet)?;
    let source = packet.source();
    let destination = packet.destination();

    if rules.is_blocked_address(source) || rules.is_blocked_address(destination) {
        return Ok(Action::Block);
    }

    if !rules.local_net.is_inbound(source, destination) {
        return Ok(Action::Allow);
    }

    let action = match packet.protocol() {
        Protocol::Icmp => {
            if rules.block_inbound_echo_request && packet.icmp_type()? == ICMP_ECHO_REQUEST {
                Action::Block
            } else {
                Action::Allow
            }
        }
        Protocol::Tcp => {
            if !rules.blocked_tcp_ports.is_empty()
                && rules.is_blocked_tcp_port(packet.tcp_destination_port()?)
            {
                Action::Block
            } else {
                Action::Allow
            }
        }
        Protocol::Other(proto) => {
            debug!(%source, %destination, proto, "no rule for inbound protocol, allowing");
            Action::Allow
        }
    };
    Ok(action)
}
