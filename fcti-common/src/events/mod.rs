//! Event types for the FCTI event system
//!
//! Provides the shared `TitleEvent` definitions and the `EventBus` used to
//! publish analysis progress. Events complement logging; they never
//! replace it.

mod discovery_types;

pub use discovery_types::DiscoveryState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Title-analysis progress events
///
/// Serialized with an internal `type` tag so they can be forwarded as-is to
/// an SSE or websocket consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TitleEvent {
    /// Discovery moved between states for a property
    DiscoveryStateChanged {
        property_id: String,
        old_state: DiscoveryState,
        new_state: DiscoveryState,
        timestamp: DateTime<Utc>,
    },

    /// A search produced documents not seen before
    DocumentsDiscovered {
        property_id: String,
        task_type: String,
        term: String,
        new_documents: usize,
        total_documents: usize,
        timestamp: DateTime<Utc>,
    },

    /// A registry channel answered with a rate limit
    SearchRateLimited {
        property_id: String,
        channel: String,
        backoff_seconds: u64,
        timestamp: DateTime<Utc>,
    },

    /// Registry traffic switched to (or back from) the fallback channel
    ChannelDegraded {
        channel: String,
        degraded: bool,
        timestamp: DateTime<Utc>,
    },

    /// Chain of title rebuilt for a property
    ChainRebuilt {
        property_id: String,
        periods: usize,
        gaps: usize,
        encumbrances: usize,
        preserved_classifications: usize,
        timestamp: DateTime<Utc>,
    },

    /// Encumbrances classified for a property
    SurvivalClassified {
        property_id: String,
        classified: usize,
        surviving: usize,
        inferred: usize,
        timestamp: DateTime<Utc>,
    },

    /// End-to-end analysis finished (successfully or not) for a property
    AnalysisFinished {
        property_id: String,
        discovery_state: DiscoveryState,
        chain_complete: bool,
        survival_complete: bool,
        timestamp: DateTime<Utc>,
    },
}

impl TitleEvent {
    /// Property the event refers to, when it is property scoped
    pub fn property_id(&self) -> Option<&str> {
        match self {
            TitleEvent::DiscoveryStateChanged { property_id, .. }
            | TitleEvent::DocumentsDiscovered { property_id, .. }
            | TitleEvent::SearchRateLimited { property_id, .. }
            | TitleEvent::ChainRebuilt { property_id, .. }
            | TitleEvent::SurvivalClassified { property_id, .. }
            | TitleEvent::AnalysisFinished { property_id, .. } => Some(property_id),
            TitleEvent::ChannelDegraded { .. } => None,
        }
    }
}

/// Broadcast bus for `TitleEvent`s
///
/// Cloning the bus clones the sender; every clone publishes to the same
/// subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TitleEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<TitleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TitleEvent) -> Result<usize, broadcast::error::SendError<TitleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TitleEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(16);
        assert_eq!(bus.capacity(), 16);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(4);
        let result = bus.emit(TitleEvent::ChannelDegraded {
            channel: "primary".to_string(),
            degraded: true,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.emit_lossy(TitleEvent::DiscoveryStateChanged {
            property_id: "01-2345-000-0010".to_string(),
            old_state: DiscoveryState::Initializing,
            new_state: DiscoveryState::Discovering,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.property_id(), Some("01-2345-000-0010"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = TitleEvent::ChainRebuilt {
            property_id: "p1".to_string(),
            periods: 3,
            gaps: 1,
            encumbrances: 4,
            preserved_classifications: 2,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ChainRebuilt");
        assert_eq!(json["periods"], 3);
    }

    #[test]
    fn test_discovery_state_round_trip_names() {
        for state in [
            DiscoveryState::Initializing,
            DiscoveryState::Discovering,
            DiscoveryState::Complete,
            DiscoveryState::Exhausted,
            DiscoveryState::Capped,
            DiscoveryState::Deferred,
            DiscoveryState::Cancelled,
            DiscoveryState::Unresolvable,
        ] {
            assert_eq!(DiscoveryState::parse(state.as_str()), Some(state));
        }
        assert!(DiscoveryState::Capped.is_terminal());
        assert!(!DiscoveryState::Deferred.is_terminal());
    }
}
