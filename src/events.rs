//! Single-process publish/subscribe for the two UI-facing channels:
//! `live:newrows:{streamId}` and `live:status:{streamId}`. Delivery is
//! at-least-once; subscribers are expected to reconcile via tail queries
//! rather than trust the payload.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum Event {
    NewRows { stream_id: String, last_id: String },
    Status { stream_id: String, connected: bool },
}

impl Event {
    fn channel(&self) -> String {
        match self {
            Event::NewRows { stream_id, .. } => format!("live:newrows:{stream_id}"),
            Event::Status { stream_id, .. } => format!("live:status:{stream_id}"),
        }
    }
}

/// Holds one broadcast sender per channel name, created lazily on first
/// subscribe or publish. A channel with no subscribers simply drops its
/// events; that is fine, since the UI only ever treats them as hints.
pub struct EventBus {
    channels: Mutex<HashMap<String, broadcast::Sender<Event>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }
}

impl EventBus {
    pub fn publish(&self, event: Event) {
        let channel = event.channel();
        let channels = self.channels.lock().expect("event bus mutex poisoned");
        if let Some(tx) = channels.get(&channel) {
            // A closed channel (zero subscribers) returns Err; at-least-once
            // delivery means that's a legitimate no-op, not a failure.
            let _ = tx.send(event);
        }
    }

    pub fn subscribe(&self, channel: impl Into<String>) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.lock().expect("event bus mutex poisoned");
        channels
            .entry(channel.into())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe("live:newrows:abc");
        bus.publish(Event::NewRows {
            stream_id: "abc".into(),
            last_id: "42".into(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::NewRows { stream_id, .. } if stream_id == "abc"));
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(Event::Status {
            stream_id: "none".into(),
            connected: true,
        });
    }
}
