//! # Event Bus System
//!
//! Provides an event-driven architecture for the narration core using `tokio::sync::broadcast`.
//! This module enables decoupled communication between the narration pipeline and the
//! host UI through typed events.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │ Orchestrator (A) ├──────────>│           │
//! └──────────────────┘           │           │
//!                                │ EventBus  │   subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │ (broadcast├──────────────>│  Host UI   │
//! │ Orchestrator (B) ├──────────>│  channel) │               └────────────┘
//! └──────────────────┘           │           │
//!                                │           │   subscribe   ┌────────────┐
//! ┌──────────────────┐   emit    │           ├──────────────>│ Analytics  │
//! │ ProgressTracker  ├──────────>│           │               └────────────┘
//! └──────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, NarrationEvent};
//!
//! let event_bus = EventBus::new(100);
//! let event = CoreEvent::Narration(NarrationEvent::Completed {
//!     panel_id: "doppler".to_string(),
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Filtering Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventStream, CoreEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = EventStream::new(event_bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Progress(_)));
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         println!("Progress: {:?}", event);
//!     }
//! });
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitting with no subscribers returns an error; publishers ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Narration lifecycle events, one stream for every panel
    Narration(NarrationEvent),
    /// Learner progress events
    Progress(ProgressEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Narration(e) => e.description(),
            CoreEvent::Progress(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Narration(NarrationEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Narration(NarrationEvent::CacheWriteSkipped { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Narration(NarrationEvent::Started { .. })
            | CoreEvent::Narration(NarrationEvent::Completed { .. })
            | CoreEvent::Progress(ProgressEvent::ModuleCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Panel the event concerns, when it concerns one.
    pub fn panel_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Narration(e) => e.panel_id(),
            CoreEvent::Progress(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Narration Events
// ============================================================================

/// Events emitted by narration orchestrators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NarrationEvent {
    /// The panel's published status line changed.
    StatusChanged {
        panel_id: String,
        status: String,
        is_narrating: bool,
    },
    /// Audio started playing for the panel.
    Started {
        panel_id: String,
        title: String,
        from_cache: bool,
    },
    /// The user stopped the panel's narration.
    Stopped { panel_id: String },
    /// The panel's audio was cut off because another panel started narrating.
    Superseded {
        panel_id: String,
        by_panel_id: String,
    },
    /// Audio played to the end.
    Completed { panel_id: String },
    /// The pipeline failed; `message` is the user-facing text.
    Failed {
        panel_id: String,
        kind: String,
        message: String,
    },
    /// A previously published error was cleared.
    ErrorCleared { panel_id: String },
    /// Generated audio could not be persisted. Playback continues.
    CacheWriteSkipped { cache_key: String, reason: String },
}

impl NarrationEvent {
    fn description(&self) -> &str {
        match self {
            NarrationEvent::StatusChanged { .. } => "Narration status changed",
            NarrationEvent::Started { .. } => "Narration started",
            NarrationEvent::Stopped { .. } => "Narration stopped",
            NarrationEvent::Superseded { .. } => "Narration superseded by another panel",
            NarrationEvent::Completed { .. } => "Narration completed",
            NarrationEvent::Failed { .. } => "Narration failed",
            NarrationEvent::ErrorCleared { .. } => "Narration error cleared",
            NarrationEvent::CacheWriteSkipped { .. } => "Narration audio not cached",
        }
    }

    fn panel_id(&self) -> Option<&str> {
        match self {
            NarrationEvent::StatusChanged { panel_id, .. }
            | NarrationEvent::Started { panel_id, .. }
            | NarrationEvent::Stopped { panel_id }
            | NarrationEvent::Superseded { panel_id, .. }
            | NarrationEvent::Completed { panel_id }
            | NarrationEvent::Failed { panel_id, .. }
            | NarrationEvent::ErrorCleared { panel_id } => Some(panel_id),
            NarrationEvent::CacheWriteSkipped { .. } => None,
        }
    }
}

// ============================================================================
// Progress Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ProgressEvent {
    /// A module's knowledge check was passed for the first time.
    ModuleCompleted { module_id: String },
}

impl ProgressEvent {
    fn description(&self) -> &str {
        match self {
            ProgressEvent::ModuleCompleted { .. } => "Module completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cheap to clone; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error when
    /// nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscription. Only events emitted after this call are seen.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Wrapper around a broadcast receiver with optional filtering.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only yield events concerning `panel_id`.
    pub fn for_panel(self, panel_id: impl Into<String>) -> Self {
        let panel_id = panel_id.into();
        self.filter(move |event| event.panel_id() == Some(panel_id.as_str()))
    }

    /// Receives the next event matching the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(panel: &str) -> CoreEvent {
        CoreEvent::Narration(NarrationEvent::Completed {
            panel_id: panel.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(completed("doppler")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Narration(NarrationEvent::Started {
            panel_id: "doppler".to_string(),
            title: "Doppler Shift".to_string(),
            from_cache: false,
        });

        assert_eq!(bus.emit(event.clone()).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Progress(_)));

        bus.emit(completed("doppler")).ok();
        let progress = CoreEvent::Progress(ProgressEvent::ModuleCompleted {
            module_id: "waves-1".to_string(),
        });
        bus.emit(progress.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), progress);
    }

    #[tokio::test]
    async fn test_event_stream_for_panel() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).for_panel("lens");

        bus.emit(completed("doppler")).ok();
        bus.emit(completed("lens")).ok();

        assert_eq!(stream.recv().await.unwrap(), completed("lens"));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(completed(&format!("panel-{}", i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Narration(NarrationEvent::Failed {
            panel_id: "doppler".to_string(),
            kind: "quota_exceeded".to_string(),
            message: "Daily audio limit reached.".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let skipped = CoreEvent::Narration(NarrationEvent::CacheWriteSkipped {
            cache_key: "ns_Doppler".to_string(),
            reason: "quota".to_string(),
        });
        assert_eq!(skipped.severity(), EventSeverity::Warning);
        assert_eq!(skipped.panel_id(), None);

        assert_eq!(completed("doppler").severity(), EventSeverity::Info);

        let status = CoreEvent::Narration(NarrationEvent::StatusChanged {
            panel_id: "doppler".to_string(),
            status: "Playing…".to_string(),
            is_narrating: true,
        });
        assert_eq!(status.severity(), EventSeverity::Debug);
        assert_eq!(status.description(), "Narration status changed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Narration(NarrationEvent::Superseded {
            panel_id: "doppler".to_string(),
            by_panel_id: "lens".to_string(),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Narration\""));
        assert!(json.contains("\"event\":\"Superseded\""));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let bus1 = bus.clone();
        let bus2 = bus.clone();

        let handle1 = tokio::spawn(async move {
            for i in 0..10 {
                bus1.emit(completed(&format!("a-{}", i))).ok();
            }
        });
        let handle2 = tokio::spawn(async move {
            for i in 0..10 {
                bus2.emit(CoreEvent::Progress(ProgressEvent::ModuleCompleted {
                    module_id: format!("m-{}", i),
                }))
                .ok();
            }
        });

        handle1.await.ok();
        handle2.await.ok();

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
