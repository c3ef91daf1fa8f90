mod test;

use std::sync::Arc;

use ipfilter_common::{Action, Mode};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::{
    classifier::classify,
    logger::log_packet,
    stream::{PacketReader, PacketWriter},
    Error, Result, RuleSet, SharedState,
};

/// Counters kept by a [Dispatcher] over its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Records read from the input.
    pub received: u64,
    /// Records written to the output.
    pub forwarded: u64,
    /// Records dropped by the mode or the rule set.
    pub dropped: u64,
    /// Records skipped for exceeding the reader's capacity.
    pub rejected: u64,
}

/// Moves records from an input stream to an output stream, dropping the ones
/// the current [Mode] or [RuleSet] doesn't allow.
///
/// The dispatcher owns both streams and releases them when [run](Self::run)
/// returns.
pub struct Dispatcher<R, W> {
    rules: Arc<RuleSet>,
    state: Arc<SharedState>,
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
    log_packets: bool,
    stats: DispatchStats,
}

impl<R, W> Dispatcher<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        rules: Arc<RuleSet>,
        state: Arc<SharedState>,
        reader: PacketReader<R>,
        writer: PacketWriter<W>,
    ) -> Self {
        Self {
            rules,
            state,
            reader,
            writer,
            log_packets: false,
            stats: DispatchStats::default(),
        }
    }

    /// Logs every decided packet on the `packet_log` target.
    pub fn with_packet_log(self, enabled: bool) -> Self {
        Self {
            log_packets: enabled,
            ..self
        }
    }

    /// Runs until the input ends or a stop is requested.
    ///
    /// Oversized records are skipped. A record being written when the stop
    /// arrives is completed first; a pending read is abandoned.
    pub async fn run(mut self) -> Result<DispatchStats> {
        info!(capacity = self.reader.capacity(), "dispatcher started");
        let state = Arc::clone(&self.state);
        loop {
            if state.stop_requested() {
                debug!("stop requested");
                break;
            }

            let record = tokio::select! {
                biased;
                _ = state.stopped() => {
                    debug!("stop requested while waiting for input");
                    break;
                }
                record = self.reader.read_record() => record,
            };

            match record {
                Ok(Some(packet)) => self.dispatch(&packet).await?,
                Ok(None) => {
                    info!("input stream ended");
                    break;
                }
                Err(Error::OversizedRecord { len, capacity }) => {
                    self.stats.rejected += 1;
                    warn!(len, capacity, "skipping oversized record");
                }
                Err(Error::TruncatedRecord) => {
                    warn!("input stream ended inside a record");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let stats = self.stats;
        info!(
            received = stats.received,
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            rejected = stats.rejected,
            "dispatcher stopped"
        );
        Ok(stats)
    }

    async fn dispatch(&mut self, packet: &[u8]) -> Result<()> {
        self.stats.received += 1;
        let mode = self.state.mode();
        let action = decide(&self.rules, mode, packet);
        if self.log_packets {
            log_packet(packet, mode, action);
        }

        match action {
            Action::Allow => {
                self.writer.write_record(packet).await?;
                self.stats.forwarded += 1;
            }
            Action::Block => self.stats.dropped += 1,
        }
        Ok(())
    }
}

fn decide(rules: &RuleSet, mode: Mode, packet: &[u8]) -> Action {
    mode.forced_action().unwrap_or_else(|| classify(rules, packet))
}
