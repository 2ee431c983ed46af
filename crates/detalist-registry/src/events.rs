//! Registry notifications
//!
//! The registry only needs a narrow, fire-and-forget [`EventSink::emit`]
//! capability. Delivery and subscription belong to whoever implements it:
//! [`MemorySink`] keeps events in memory, and an unbounded tokio channel
//! sender forwards them to an async listener.

use crate::types::ItemId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Notification emitted after a committed mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum RegistryEvent {
    /// An item was created
    ItemAdded {
        /// Assigned id
        id: ItemId,
        /// Item code
        code: String,
        /// Bench the item was made on
        bench: String,
        /// `params` serialized as JSON
        params: String,
        /// `additionalInfo` serialized as JSON
        additional_info: String,
    },
    /// An item was marked broken
    Broke {
        /// Broken item
        id: ItemId,
        /// Item code
        code: String,
        /// Bench the item was made on
        bench: String,
    },
}

impl RegistryEvent {
    /// Event name as seen by listeners
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "ItemAdded",
            Self::Broke { .. } => "Broke",
        }
    }

    /// Item the event is about
    #[must_use]
    pub fn id(&self) -> ItemId {
        match self {
            Self::ItemAdded { id, .. } | Self::Broke { id, .. } => *id,
        }
    }
}

/// Receiver of registry notifications
pub trait EventSink {
    /// Deliver `event`; failures are the sink's concern
    fn emit(&self, event: RegistryEvent);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn emit(&self, event: RegistryEvent) {
        (**self).emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: RegistryEvent) {
        (**self).emit(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&self, event: RegistryEvent) {
        (**self).emit(event);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: RegistryEvent) {}
}

/// Keeps every event in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<RegistryEvent>>,
}

impl MemorySink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of received events
    #[must_use]
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events.lock().clone()
    }

    /// Take all received events
    pub fn drain(&self) -> Vec<RegistryEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of received events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True if nothing was received
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: RegistryEvent) {
        self.events.lock().push(event);
    }
}

impl EventSink for UnboundedSender<RegistryEvent> {
    fn emit(&self, event: RegistryEvent) {
        if let Err(err) = self.send(event) {
            tracing::warn!(event = err.0.name(), id = %err.0.id(), "event listener is gone; dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn broke(id: u64) -> RegistryEvent {
        RegistryEvent::Broke {
            id: ItemId(id),
            code: format!("C{id}"),
            bench: "b1".into(),
        }
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(broke(1));
        sink.emit(broke(0));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.drain(), vec![broke(1), broke(0)]);
        assert!(sink.is_empty());
    }

    #[test]
    fn shared_sink_through_arc() {
        let sink = Arc::new(MemorySink::new());
        let handle: Arc<MemorySink> = Arc::clone(&sink);
        handle.emit(broke(3));
        assert_eq!(sink.events(), vec![broke(3)]);
    }

    #[test]
    fn event_wire_shape() {
        let event = RegistryEvent::ItemAdded {
            id: ItemId(0),
            code: "A1".into(),
            bench: "bench1".into(),
            params: "{}".into(),
            additional_info: "{}".into(),
        };
        assert_eq!(event.name(), "ItemAdded");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "ItemAdded",
                "id": 0,
                "code": "A1",
                "bench": "bench1",
                "params": "{}",
                "additionalInfo": "{}"
            })
        );
    }

    #[tokio::test]
    async fn channel_sink_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.emit(broke(7));
        assert_eq!(rx.recv().await, Some(broke(7)));
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<RegistryEvent>();
        drop(rx);
        tx.emit(broke(1));
    }
}
