use std::{io, path::PathBuf};

use ipfilter_common::HeaderError;
use thiserror::Error;

/// Filter errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file couldn't be opened.
    #[error("couldn't open configuration {}: {source}", path.display())]
    ConfigNotFound { path: PathBuf, source: io::Error },
    /// Line with a keyword the loader doesn't know.
    #[error("invalid line {line} in configuration: {text:?}")]
    ConfigSyntax { line: usize, text: String },
    /// Known keyword with an argument that can't be used.
    #[error("invalid directive at line {line}: {reason}")]
    InvalidDirective { line: usize, reason: String },
    /// Configuration never set `LOCAL_NET`.
    #[error("configuration must set LOCAL_NET")]
    MissingLocalNet,
    /// Input or output stream couldn't be opened.
    #[error("failed to open stream {name}: {source}")]
    StreamOpen { name: String, source: io::Error },
    /// Record longer than the reader accepts. The record has been skipped.
    #[error("record of {len} bytes exceeds capacity of {capacity}")]
    OversizedRecord { len: usize, capacity: usize },
    /// Stream ended in the middle of a record.
    #[error("stream ended inside a record")]
    TruncatedRecord,
    /// Dispatcher task died without returning.
    #[error("dispatcher task failed: {0}")]
    DispatcherPanicked(String),
    /// Packet too short or not IPv4.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// IO error
    #[error(transparent)]
    Io(#[from] io::Error),
}
