//! Userspace IPv4 packet filter.
//!
//! Packets arrive as length-prefixed records on an input stream, are checked
//! against a [RuleSet] according to the current [Mode] and, when allowed, are
//! written unchanged to an output stream.
//!
//! # Example
//! ```no_run
//! # use ipfilter::{Firewall, Mode, RuleSet};
//! # async fn run() -> ipfilter::Result<()> {
//! let rules: RuleSet = "LOCAL_NET 192.168.1.0/24\nBLOCK_PING_REQ".parse()?;
//! let firewall = Firewall::new(rules);
//! let dispatcher = firewall.spawn_on_paths("ToFirewall", "FromFirewall");
//! firewall.set_mode(Mode::BlockAll);
//! firewall.shutdown(dispatcher).await?;
//! # Ok(())
//! # }
//! ```
mod cidr;
mod classifier;
mod config;
mod controller;
mod dispatcher;
mod error;
mod firewall;
mod logger;
mod rule;
mod state;
mod stream;

#[cfg(test)]
mod test_packet;

pub use crate::firewall::Firewall;
pub use ipfilter_common::{Action, Mode};

pub use cidr::{mask_prefix, LocalNet};
pub use classifier::classify;
pub use controller::{Command, ModeController};
pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::Error;
pub use rule::RuleSet;
pub use state::SharedState;
pub use stream::{PacketReader, PacketWriter};
pub type Result<T> = std::result::Result<T, Error>;

/// Largest record accepted from the input stream unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 2048;
/// Default name of the stream packets are read from.
pub const INPUT_STREAM: &str = "ToFirewall";
/// Default name of the stream allowed packets are written to.
pub const OUTPUT_STREAM: &str = "FromFirewall";
