//! Event sinks.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Receives pipeline, retry and deployment events.
///
/// Emission is fire-and-forget: implementations must not block and must
/// not fail, since events are reported from inside retry loops and stage
/// transitions.
pub trait EventSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// Discards every event. The default for pipelines and orchestrators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// An event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Event type, one of [`super::types`].
    pub event_type: String,
    /// Payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// When the event was emitted.
    pub at: DateTime<Utc>,
}

/// Keeps every event in memory, for tests and run audits.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Returns event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|e| e.event_type.clone()).collect()
    }

    /// Returns events whose type starts with `prefix`, so `"stage."`
    /// selects every stage transition.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of events seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_collecting_sink_keeps_order_and_payload() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(types::STAGE_STARTED, Some(json!({"stage": "code_generator"})));
        sink.emit(types::DEPLOYMENT_PHASE, Some(json!({"phase": "validating"})));
        sink.emit(types::STAGE_COMPLETED, None);

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.event_types(),
            vec!["stage.started", "deployment.phase", "stage.completed"]
        );
        let phases = sink.events_of_type(types::DEPLOYMENT_PHASE);
        assert_eq!(phases[0].data, Some(json!({"phase": "validating"})));
        assert_eq!(sink.events_of_type("stage.").len(), 2);
    }

    #[test]
    fn test_noop_sink_accepts_events() {
        NoOpEventSink.emit(types::RETRY_ATTEMPT, Some(json!({"attempt": 1})));
    }
}
