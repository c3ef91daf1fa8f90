use std::{convert::TryFrom, net::Ipv4Addr};

use ipfilter_common::{Action, Ipv4Packet, Mode, Protocol};
use serde::Serialize;

use crate::{Error, Result};

pub(crate) const PACKET_LOG_TARGET: &str = "packet_log";

/// Emits one JSON line per decided packet at `info` on the `packet_log` target.
pub(crate) fn log_packet(packet: &[u8], mode: Mode, action: Action) {
    let Ok(packet) = PacketFormatted::try_from(Decided { packet, mode, action }) else {
        tracing::info!(target: PACKET_LOG_TARGET, len = packet.len(), %mode, %action, "non-IPv4 record");
        return;
    };
    let Ok(packet) = serde_json::to_string(&packet) else {
        return;
    };
    tracing::info!(target: PACKET_LOG_TARGET, "{packet}");
}

pub(crate) struct Decided<'a> {
    pub(crate) packet: &'a [u8],
    pub(crate) mode: Mode,
    pub(crate) action: Action,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PacketFormatted {
    pub(crate) source_ip: Ipv4Addr,
    pub(crate) destination_ip: Ipv4Addr,
    pub(crate) protocol: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) destination_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) icmp_type: Option<u8>,
    pub(crate) length: usize,
    pub(crate) mode: Mode,
    pub(crate) action: Action,
    pub(crate) timestamp: String,
}

impl TryFrom<Decided<'_>> for PacketFormatted {
    type Error = Error;

    fn try_from(value: Decided<'_>) -> Result<Self> {
        let packet = Ipv4Packet::parse(value.packet)?;
        packet.ensure_ipv4()?;
        let timestamp =
            chrono::offset::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let protocol = packet.protocol();
        let (destination_port, icmp_type) = match protocol {
            Protocol::Tcp => (packet.tcp_destination_port().ok(), None),
            Protocol::Icmp => (None, packet.icmp_type().ok()),
            Protocol::Other(_) => (None, None),
        };
        Ok(Self {
            source_ip: packet.source(),
            destination_ip: packet.destination(),
            protocol: protocol.into(),
            destination_port,
            icmp_type,
            length: packet.len(),
            mode: value.mode,
            action: value.action,
            timestamp,
        })
    }
}
