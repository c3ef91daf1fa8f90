mod packet;

pub use packet::{
    HeaderError, Ipv4Packet, Protocol, ICMP_ECHO_REQUEST, IPV4_HDR_LEN, PROTO_ICMP, PROTO_TCP,
};

use num_derive::FromPrimitive;
use serde::Serialize;
use strum_macros::{Display, EnumCount};

/// Verdict for a single packet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
    /// Forward the packet unchanged.
    Allow = 0,
    /// Drop the packet.
    Block = 1,
}

// When no rule fires the packet goes through.
impl Default for Action {
    fn default() -> Self {
        Self::Allow
    }
}

/// Operating mode of the filter, switchable at runtime.
///
/// Stored as its `u8` discriminant so it can live in an atomic.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Display, EnumCount,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Mode {
    /// Every packet is dropped.
    BlockAll = 0,
    /// Every packet is forwarded, address blocks included.
    AllowAll = 1,
    /// Packets are run through the rule set.
    Filter = 2,
}

impl Default for Mode {
    fn default() -> Self {
        Self::Filter
    }
}

impl Mode {
    /// Verdict forced by this mode, `None` when the rule set has to decide.
    pub fn forced_action(&self) -> Option<Action> {
        match self {
            Mode::BlockAll => Some(Action::Block),
            Mode::AllowAll => Some(Action::Allow),
            Mode::Filter => None,
        }
    }
}
