#![cfg(test)]

use std::{sync::Arc, time::Duration};

use crate::{
    test_packet::{icmp, other, tcp, PROTO_UDP},
    DispatchStats, Dispatcher, Error, Mode, PacketReader, PacketWriter, RuleSet, SharedState,
};
use tokio::{
    io::{AsyncRead, AsyncWriteExt, DuplexStream},
    time::timeout,
};

const CAPACITY: usize = 2048;

fn rules() -> RuleSet {
    "LOCAL_NET 192.168.1.0/24\n\
     BLOCK_PING_REQ\n\
     BLOCK_INBOUND_TCP_PORT 23\n\
     BLOCK_IP_ADDR 10.0.0.5"
        .parse()
        .unwrap()
}

fn frame(record: &[u8]) -> Vec<u8> {
    let mut out = (record.len() as u32).to_ne_bytes().to_vec();
    out.extend_from_slice(record);
    out
}

fn framed(records: &[Vec<u8>]) -> Vec<u8> {
    records.iter().flat_map(|r| frame(r)).collect()
}

fn traffic() -> Vec<Vec<u8>> {
    vec![
        tcp("8.8.8.8", "192.168.1.5", 80),
        tcp("8.8.8.8", "192.168.1.5", 23),
        icmp("8.8.8.8", "192.168.1.5", 8),
        tcp("192.168.1.5", "10.0.0.5", 443),
        other(PROTO_UDP, "8.8.8.8", "192.168.1.5"),
        icmp("192.168.1.5", "8.8.8.8", 8),
    ]
}

async fn collect(reader: impl AsyncRead + Unpin) -> Vec<Vec<u8>> {
    let mut reader = PacketReader::new(reader, usize::MAX);
    let mut out = Vec::new();
    while let Some(record) = reader.read_record().await.unwrap() {
        out.push(record.to_vec());
    }
    out
}

async fn run_with(mode: Mode, input: &[u8]) -> (DispatchStats, Vec<Vec<u8>>) {
    let state = Arc::new(SharedState::new(mode));
    let (tx, rx) = tokio::io::duplex(1 << 20);
    let dispatcher = Dispatcher::new(
        Arc::new(rules()),
        state,
        PacketReader::new(input, CAPACITY),
        PacketWriter::new(tx),
    );
    let stats = dispatcher.run().await.unwrap();
    (stats, collect(rx).await)
}

#[tokio::test]
async fn filter_mode_forwards_allowed_packets_unchanged() {
    let traffic = traffic();
    let (stats, out) = run_with(Mode::Filter, &framed(&traffic)).await;
    assert_eq!(out, vec![traffic[0].clone(), traffic[4].clone(), traffic[5].clone()]);
    assert_eq!(
        stats,
        DispatchStats {
            received: 6,
            forwarded: 3,
            dropped: 3,
            rejected: 0,
        }
    );
}

#[tokio::test]
async fn block_all_drops_everything() {
    let (stats, out) = run_with(Mode::BlockAll, &framed(&traffic())).await;
    assert!(out.is_empty());
    assert_eq!(stats.dropped, 6);
    assert_eq!(stats.forwarded, 0);
}

#[tokio::test]
async fn allow_all_forwards_everything() {
    let traffic = traffic();
    let (stats, out) = run_with(Mode::AllowAll, &framed(&traffic)).await;
    assert_eq!(out, traffic);
    assert_eq!(stats.forwarded, 6);
}

#[tokio::test]
async fn only_allow_all_overrides_address_blocks() {
    let input = framed(&[tcp("10.0.0.5", "192.168.1.5", 80)]);
    for (mode, forwarded) in [(Mode::AllowAll, 1), (Mode::Filter, 0), (Mode::BlockAll, 0)] {
        let (_, out) = run_with(mode, &input).await;
        assert_eq!(out.len(), forwarded, "{mode}");
    }
}

#[tokio::test]
async fn short_records_pass_only_in_allow_all() {
    let junk = vec![vec![0u8; 3], vec![0x45; 19]];
    let (_, out) = run_with(Mode::Filter, &framed(&junk)).await;
    assert!(out.is_empty());
    let (_, out) = run_with(Mode::AllowAll, &framed(&junk)).await;
    assert_eq!(out, junk);
}

#[tokio::test]
async fn version_nibble_does_not_affect_filtering() {
    let mut outbound = tcp("192.168.1.5", "8.8.8.8", 80);
    outbound[0] = 0x05;
    let mut inbound = tcp("8.8.8.8", "192.168.1.5", 23);
    inbound[0] = 0x65;
    let (_, out) = run_with(Mode::Filter, &framed(&[outbound.clone(), inbound])).await;
    assert_eq!(out, vec![outbound]);
}

#[tokio::test]
async fn oversized_record_is_skipped() {
    let allowed = tcp("8.8.8.8", "192.168.1.5", 80);
    let mut input = frame(&allowed);
    input.extend(frame(&[0x45; 5000]));
    input.extend(frame(&allowed));

    let (stats, out) = run_with(Mode::AllowAll, &input).await;
    assert_eq!(out, vec![allowed.clone(), allowed]);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.received, 2);
}

#[tokio::test]
async fn truncated_tail_ends_dispatch() {
    let allowed = tcp("8.8.8.8", "192.168.1.5", 80);
    let mut input = frame(&allowed);
    input.extend_from_slice(&frame(&allowed)[..10]);

    let (stats, out) = run_with(Mode::Filter, &input).await;
    assert_eq!(out, vec![allowed]);
    assert_eq!(stats.received, 1);
}

async fn send(tx: &mut DuplexStream, record: &[u8]) {
    tx.write_all(&frame(record)).await.unwrap();
    tx.flush().await.unwrap();
}

async fn next(reader: &mut PacketReader<DuplexStream>) -> Vec<u8> {
    timeout(Duration::from_secs(1), reader.read_record())
        .await
        .unwrap()
        .unwrap()
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn mode_change_applies_to_next_record() {
    let state = Arc::new(SharedState::default());
    let (mut input, input_rx) = tokio::io::duplex(1 << 16);
    let (output_tx, output) = tokio::io::duplex(1 << 16);
    let handle = tokio::spawn(
        Dispatcher::new(
            Arc::new(rules()),
            Arc::clone(&state),
            PacketReader::new(input_rx, CAPACITY),
            PacketWriter::new(output_tx),
        )
        .run(),
    );
    let mut output = PacketReader::new(output, CAPACITY);
    let blocked = tcp("8.8.8.8", "192.168.1.5", 23);
    let allowed = tcp("8.8.8.8", "192.168.1.5", 80);

    send(&mut input, &blocked).await;
    send(&mut input, &allowed).await;
    assert_eq!(next(&mut output).await, allowed);

    state.set_mode(Mode::AllowAll);
    send(&mut input, &blocked).await;
    assert_eq!(next(&mut output).await, blocked);

    state.set_mode(Mode::BlockAll);
    send(&mut input, &allowed).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    state.set_mode(Mode::Filter);
    let other_port = tcp("8.8.8.8", "192.168.1.5", 81);
    send(&mut input, &other_port).await;
    assert_eq!(next(&mut output).await, other_port);

    drop(input);
    let stats = timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        stats,
        DispatchStats {
            received: 5,
            forwarded: 3,
            dropped: 2,
            rejected: 0,
        }
    );
}

#[tokio::test]
async fn stop_interrupts_pending_read() {
    let state = Arc::new(SharedState::default());
    let (_input, input_rx) = tokio::io::duplex(64);
    let (output_tx, output) = tokio::io::duplex(64);
    let handle = tokio::spawn(
        Dispatcher::new(
            Arc::new(rules()),
            Arc::clone(&state),
            PacketReader::new(input_rx, CAPACITY),
            PacketWriter::new(output_tx),
        )
        .run(),
    );
    tokio::task::yield_now().await;

    state.request_stop();
    let stats = timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(stats, DispatchStats::default());
    // Output stream released by the dispatcher.
    assert!(collect(output).await.is_empty());
}

#[tokio::test]
async fn stop_before_start_reads_nothing() {
    let state = Arc::new(SharedState::default());
    state.request_stop();
    let input = framed(&traffic());
    let dispatcher = Dispatcher::new(
        Arc::new(rules()),
        state,
        PacketReader::new(&input[..], CAPACITY),
        PacketWriter::new(Vec::new()),
    );
    assert_eq!(dispatcher.run().await.unwrap(), DispatchStats::default());
}

#[tokio::test]
async fn closed_output_is_an_error() {
    let (tx, rx) = tokio::io::duplex(64);
    drop(rx);
    let input = framed(&traffic());
    let dispatcher = Dispatcher::new(
        Arc::new(rules()),
        Arc::new(SharedState::default()),
        PacketReader::new(&input[..], CAPACITY),
        PacketWriter::new(tx),
    );
    assert!(matches!(dispatcher.run().await, Err(Error::Io(_))));
}

#[tokio::test]
async fn packet_log_does_not_change_forwarding() {
    let traffic = traffic();
    let input = framed(&traffic);
    let (tx, rx) = tokio::io::duplex(1 << 16);
    let stats = Dispatcher::new(
        Arc::new(rules()),
        Arc::new(SharedState::default()),
        PacketReader::new(&input[..], CAPACITY),
        PacketWriter::new(tx),
    )
    .with_packet_log(true)
    .run()
    .await
    .unwrap();
    assert_eq!(stats.forwarded, 3);
    assert_eq!(collect(rx).await.len(), 3);
}
