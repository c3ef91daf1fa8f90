//! Raw datagrams for tests.

use std::net::Ipv4Addr;

use ipfilter_common::{IPV4_HDR_LEN, PROTO_ICMP, PROTO_TCP};

pub(crate) const PROTO_UDP: u8 = 0x11;

fn datagram(proto: u8, src: &str, dst: &str, transport: &[u8]) -> Vec<u8> {
    let src: Ipv4Addr = src.parse().unwrap();
    let dst: Ipv4Addr = dst.parse().unwrap();
    let total = (IPV4_HDR_LEN + transport.len()) as u16;
    let mut data = vec![0u8; IPV4_HDR_LEN];
    data[0] = 0x45;
    data[2..4].copy_from_slice(&total.to_be_bytes());
    data[8] = 64;
    data[9] = proto;
    data[12..16].copy_from_slice(&src.octets());
    data[16..20].copy_from_slice(&dst.octets());
    data.extend_from_slice(transport);
    data
}

pub(crate) fn tcp(src: &str, dst: &str, dst_port: u16) -> Vec<u8> {
    let mut header = [0u8; 20];
    header[0..2].copy_from_slice(&40000u16.to_be_bytes());
    header[2..4].copy_from_slice(&dst_port.to_be_bytes());
    header[12] = 0x50;
    datagram(PROTO_TCP, src, dst, &header)
}

pub(crate) fn icmp(src: &str, dst: &str, icmp_type: u8) -> Vec<u8> {
    datagram(PROTO_ICMP, src, dst, &[icmp_type, 0, 0, 0, 0, 1, 0, 1])
}

pub(crate) fn other(proto: u8, src: &str, dst: &str) -> Vec<u8> {
    datagram(proto, src, dst, &[0u8; 8])
}

pub(crate) fn truncated(proto: u8, src: &str, dst: &str) -> Vec<u8> {
    datagram(proto, src, dst, &[])
}
