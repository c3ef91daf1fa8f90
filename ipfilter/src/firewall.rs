
use std::{path::Path, sync::Arc};

use ipfilter_common::Mode;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncBufRead, AsyncRead, AsyncWrite},
    task::JoinHandle,
};
use tracing::info;

use crate::{
    controller::{self, ModeController},
    DispatchStats, Dispatcher, Error, PacketReader, PacketWriter, Result, RuleSet, SharedState,
    DEFAULT_CAPACITY,
};

/// Represents a filter sitting between two packet streams.
///
/// The [RuleSet] is fixed at creation. The [Mode] can be changed at any time,
/// from any clone of the firewall, and applies to the next record the
/// dispatcher reads.
///
/// See example at the [crate-level doc](crate#example).
#[derive(Debug, Clone)]
pub struct Firewall {
    rules: Arc<RuleSet>,
    state: Arc<SharedState>,
    capacity: usize,
    log_packets: bool,
}

impl Firewall {
    /// Creates a new [Firewall] in [Filter](Mode::Filter) mode.
    ///
    /// # Example
    /// ```no_run
    /// # use ipfilter::{Firewall, RuleSet};
    /// let rules = RuleSet::load("firewall.conf").unwrap();
    /// let fw = Firewall::new(rules);
    /// ```
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
            state: Arc::new(SharedState::default()),
            capacity: DEFAULT_CAPACITY,
            log_packets: false,
        }
    }

    /// Sets the largest record the dispatcher accepts. Longer records are skipped.
    pub fn with_capacity(self, capacity: usize) -> Self {
        Self { capacity, ..self }
    }

    /// Logs every decided packet as JSON on the `packet_log` target, at `info` level.
    pub fn with_packet_log(self, enabled: bool) -> Self {
        Self {
            log_packets: enabled,
            ..self
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode()
    }

    /// Switches the filtering [Mode].
    ///
    /// # Example
    /// ```no_run
    /// # use ipfilter::{Firewall, Mode, RuleSet};
    /// let fw = Firewall::new("LOCAL_NET 10.0.0.0/8".parse().unwrap());
    /// fw.set_mode(Mode::BlockAll);
    /// ```
    pub fn set_mode(&self, mode: Mode) {
        self.state.set_mode(mode);
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    /// Builds a [Dispatcher] over the given streams sharing this firewall's mode.
    pub fn dispatcher<R, W>(&self, reader: R, writer: W) -> Dispatcher<R, W>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        Dispatcher::new(
            Arc::clone(&self.rules),
            Arc::clone(&self.state),
            PacketReader::new(reader, self.capacity),
            PacketWriter::new(writer),
        )
        .with_packet_log(self.log_packets)
    }

    /// Runs a dispatcher over the given streams on a background task.
    pub fn spawn<R, W>(&self, reader: R, writer: W) -> JoinHandle<Result<DispatchStats>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(self.dispatcher(reader, writer).run())
    }

    /// Opens the named streams and runs a dispatcher over them on a background task.
    ///
    /// Opening happens inside the task. With a FIFO it blocks until the peer
    /// opens the other end, so a stop requested meanwhile ends the task
    /// without error. A stream that can't be opened fails the task with
    /// [StreamOpen](Error::StreamOpen).
    ///
    /// # Example
    /// ```no_run
    /// # use ipfilter::{Firewall, RuleSet};
    /// # async fn run() -> ipfilter::Result<()> {
    /// let fw = Firewall::new(RuleSet::load("firewall.conf")?);
    /// let dispatcher = fw.spawn_on_paths("ToFirewall", "FromFirewall");
    /// let stats = fw.shutdown(dispatcher).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn_on_paths(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> JoinHandle<Result<DispatchStats>> {
        let input = input.as_ref().to_path_buf();
        let output = output.as_ref().to_path_buf();
        let firewall = self.clone();
        tokio::spawn(async move {
            let opened = tokio::select! {
                biased;
                _ = firewall.state.stopped() => None,
                streams = open_streams(&input, &output) => Some(streams?),
            };
            match opened {
                Some((reader, writer)) => firewall.dispatcher(reader, writer).run().await,
                None => {
                    info!("stopped before the streams were opened");
                    Ok(DispatchStats::default())
                }
            }
        })
    }

    /// Builds the operator loop for this firewall.
    pub fn controller<I, O>(&self, input: I, output: O) -> ModeController<I, O>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        ModeController::new(Arc::clone(&self.state), input, output)
    }

    /// Stops the dispatcher behind `dispatcher` and waits for it to release its streams.
    pub async fn shutdown(
        &self,
        dispatcher: JoinHandle<Result<DispatchStats>>,
    ) -> Result<DispatchStats> {
        controller::shutdown(&self.state, dispatcher).await
    }
}

async fn open_streams(input: &Path, output: &Path) -> Result<(File, File)> {
    let reader = File::open(input).await.map_err(|source| Error::StreamOpen {
        name: input.display().to_string(),
        source,
    })?;
    info!(path = %input.display(), "input stream opened");
    let writer = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)
        .await
        .map_err(|source| Error::StreamOpen {
            name: output.display().to_string(),
            source,
        })?;
    info!(path = %output.display(), "output stream opened");
    Ok((reader, writer))
}
