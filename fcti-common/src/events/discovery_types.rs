//! Discovery state types carried by title events

use serde::{Deserialize, Serialize};

/// Per-property discovery state machine
///
/// `Initializing → Discovering → {Complete | Exhausted | Capped}`, plus the
/// two non-final stops a run can make: `Deferred` (only backed-off tasks
/// remain) and `Cancelled` (external timeout or shutdown). `Unresolvable`
/// is the terminal outcome for a property with nothing searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryState {
    Initializing,
    Discovering,
    Complete,
    Exhausted,
    Capped,
    Deferred,
    Cancelled,
    Unresolvable,
}

impl DiscoveryState {
    /// States after which rerunning discovery adds nothing
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DiscoveryState::Complete
                | DiscoveryState::Exhausted
                | DiscoveryState::Capped
                | DiscoveryState::Unresolvable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryState::Initializing => "INITIALIZING",
            DiscoveryState::Discovering => "DISCOVERING",
            DiscoveryState::Complete => "COMPLETE",
            DiscoveryState::Exhausted => "EXHAUSTED",
            DiscoveryState::Capped => "CAPPED",
            DiscoveryState::Deferred => "DEFERRED",
            DiscoveryState::Cancelled => "CANCELLED",
            DiscoveryState::Unresolvable => "UNRESOLVABLE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INITIALIZING" => Some(DiscoveryState::Initializing),
            "DISCOVERING" => Some(DiscoveryState::Discovering),
            "COMPLETE" => Some(DiscoveryState::Complete),
            "EXHAUSTED" => Some(DiscoveryState::Exhausted),
            "CAPPED" => Some(DiscoveryState::Capped),
            "DEFERRED" => Some(DiscoveryState::Deferred),
            "CANCELLED" => Some(DiscoveryState::Cancelled),
            "UNRESOLVABLE" => Some(DiscoveryState::Unresolvable),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
