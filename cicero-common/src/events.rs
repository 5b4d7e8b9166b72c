//! Extraction event system
//!
//! Provides the shared event definitions and the EventBus that carries
//! extraction progress from the extraction service to any listener
//! (CLI progress output, tests, future UIs).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Extraction progress events
///
/// Events are only emitted for durable facts: `SpeechCommitted` follows the
/// commit of its speech, never precedes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractionEvent {
    /// A run passed the idempotency guard and resolved its pattern
    ExtractionStarted {
        protocol_id: Uuid,
        pattern_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One speech triple was committed
    SpeechCommitted {
        protocol_id: Uuid,
        speech_id: Uuid,
        speaker_id: Uuid,
        /// 1-based position within the protocol
        ordinal: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run finished; `speech_count` may be zero
    ExtractionCompleted {
        protocol_id: Uuid,
        speech_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run failed after starting
    ExtractionFailed {
        protocol_id: Uuid,
        /// Speeches that stay committed despite the failure
        committed: usize,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ExtractionEvent {
    /// Protocol the event belongs to
    pub fn protocol_id(&self) -> Uuid {
        match self {
            ExtractionEvent::ExtractionStarted { protocol_id, .. }
            | ExtractionEvent::SpeechCommitted { protocol_id, .. }
            | ExtractionEvent::ExtractionCompleted { protocol_id, .. }
            | ExtractionEvent::ExtractionFailed { protocol_id, .. } => *protocol_id,
        }
    }
}

/// Broadcast bus for [`ExtractionEvent`]s
///
/// Cloning the bus is cheap; clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ExtractionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per slow subscriber
    /// before the oldest ones are dropped.
    ///
    /// ```
    /// use cicero_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ExtractionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ExtractionEvent,
    ) -> Result<usize, broadcast::error::SendError<ExtractionEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ExtractionEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
