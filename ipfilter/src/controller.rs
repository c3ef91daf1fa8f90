
use std::sync::Arc;

use ipfilter_common::Mode;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{DispatchStats, Error, Result, SharedState};

/// Operator command, entered as its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Command {
    #[strum(serialize = "Block All")]
    BlockAll,
    #[strum(serialize = "Allow All")]
    AllowAll,
    #[strum(serialize = "Filter")]
    Filter,
    #[strum(serialize = "Exit")]
    Exit,
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Command::Exit => 0,
            Command::BlockAll => 1,
            Command::AllowAll => 2,
            Command::Filter => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::iter().find(|command| i64::from(command.code()) == code)
    }

    /// Parses a line holding a command number, `None` for anything else.
    pub fn parse(line: &str) -> Option<Self> {
        line.trim().parse().ok().and_then(Self::from_code)
    }

    /// Mode selected by this command, `None` for [Exit](Command::Exit).
    pub fn mode(&self) -> Option<Mode> {
        match self {
            Command::BlockAll => Some(Mode::BlockAll),
            Command::AllowAll => Some(Mode::AllowAll),
            Command::Filter => Some(Mode::Filter),
            Command::Exit => None,
        }
    }

    pub fn menu() -> String {
        let mut menu = String::from("\n");
        for command in Self::iter() {
            menu.push_str(&format!("{}. {command}\n", command.code()));
        }
        menu.push_str("> ");
        menu
    }
}

/// Foreground loop that applies operator commands to a running dispatcher.
///
/// Commands are read one per line. Unknown input is ignored. `Exit`, or the
/// end of the command input, stops the dispatcher and waits for it to release
/// its streams before returning.
pub struct ModeController<I, O> {
    state: Arc<SharedState>,
    input: I,
    output: O,
}

impl<I, O> ModeController<I, O>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    pub fn new(state: Arc<SharedState>, input: I, output: O) -> Self {
        Self {
            state,
            input,
            output,
        }
    }

    /// Applies a mode command. Returns `false` for [Exit](Command::Exit).
    pub fn apply(&self, command: Command) -> bool {
        apply(&self.state, command)
    }

    /// Runs the command loop against the dispatcher behind `dispatcher`.
    ///
    /// Returns the dispatcher's counters once it has stopped. A dispatcher
    /// failure ends the loop early with that error.
    pub async fn run(
        self,
        mut dispatcher: JoinHandle<Result<DispatchStats>>,
    ) -> Result<DispatchStats> {
        let Self {
            state,
            input,
            mut output,
        } = self;
        let mut lines = input.lines();
        let mut finished = None;
        let mut prompt = true;
        loop {
            if prompt {
                output.write_all(Command::menu().as_bytes()).await?;
                output.flush().await?;
            }

            prompt = true;
            let line = tokio::select! {
                joined = &mut dispatcher, if finished.is_none() => {
                    let stats = joined_stats(joined).map_err(|e| {
                        error!("dispatcher failed: {e}");
                        e
                    })?;
                    info!("dispatcher finished, no more packets will be forwarded");
                    finished = Some(stats);
                    prompt = false;
                    continue;
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                debug!("command input closed");
                break;
            };
            match Command::parse(&line) {
                Some(command) => {
                    if !apply(&state, command) {
                        break;
                    }
                }
                None => debug!(input = line.trim(), "ignoring unknown command"),
            }
        }

        info!("shutting down");
        match finished {
            Some(stats) => Ok(stats),
            None => shutdown(&state, dispatcher).await,
        }
    }
}

fn apply(state: &SharedState, command: Command) -> bool {
    match command.mode() {
        Some(mode) => {
            state.set_mode(mode);
            true
        }
        None => false,
    }
}

/// Requests a stop and waits for the dispatcher to finish its current record.
pub(crate) async fn shutdown(
    state: &SharedState,
    dispatcher: JoinHandle<Result<DispatchStats>>,
) -> Result<DispatchStats> {
    state.request_stop();
    joined_stats(dispatcher.await)
}

fn joined_stats(
    joined: std::result::Result<Result<DispatchStats>, tokio::task::JoinError>,
) -> Result<DispatchStats> {
    joined.map_err(|e| Error::DispatcherPanicked(e.to_string()))?
}
