//! # Process-wide Event Bus
//!
//! Events are namespaced strings segmented by `::`
//! (`creature::talk`, `creature::talk::error`) with a JSON payload.
//! Subscriptions are pattern-based: a pattern has the same segment count as
//! the names it matches, and `*` matches any single segment
//! (`creature::*`, `*::*::error`).
//!
//! Delivery is fan-out over unbounded channels; a dropped receiver prunes
//! its subscription on the next emit.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;

/// The namespace delimiter for event names and patterns.
pub const DELIMITER: &str = "::";

/// A namespaced event and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

struct Subscription {
    pattern: Vec<String>,
    tx: mpsc::UnboundedSender<Event>,
}

/// Fan-out bus for namespaced events.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
}

fn matches(pattern: &[String], name: &str) -> bool {
    let segments: Vec<&str> = name.split(DELIMITER).collect();
    pattern.len() == segments.len()
        && pattern
            .iter()
            .zip(&segments)
            .all(|(p, s)| p == "*" || p == s)
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Subscribes to every event whose name matches `pattern`.
    pub fn subscribe(&self, pattern: &str) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pattern = pattern.split(DELIMITER).map(str::to_string).collect();
        self.subscriptions
            .lock()
            .expect("event bus lock poisoned")
            .push(Subscription { pattern, tx });
        rx
    }

    /// Emits an event to every matching subscriber, pruning closed ones.
    pub fn emit(&self, name: &str, payload: Value) {
        let event = Event {
            name: name.to_string(),
            payload,
        };
        let mut subscriptions = self.subscriptions.lock().expect("event bus lock poisoned");
        subscriptions.retain(|sub| {
            if matches(&sub.pattern, name) {
                sub.tx.send(event.clone()).is_ok()
            } else {
                !sub.tx.is_closed()
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn exact_name_delivery() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("creature::talk");
        bus.emit("creature::talk", json!("hi"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, "creature::talk");
        assert_eq!(event.payload, json!("hi"));
    }

    #[tokio::test]
    async fn wildcard_matches_one_segment() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("creature::*");
        bus.emit("creature::talk", json!(1));
        bus.emit("creature::talk::error", json!(2));
        bus.emit("weapon::fire", json!(3));
        assert_eq!(rx.recv().await.unwrap().payload, json!(1));
        // The three-segment error event and the other resource never arrive.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_events_observable_across_resources() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("*::*::error");
        bus.emit("creature::talk::error", json!("bad"));
        bus.emit("creature::talk", json!("fine"));
        assert_eq!(rx.recv().await.unwrap().name, "creature::talk::error");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe("a::b");
        drop(rx);
        bus.emit("a::b", json!(null));
        assert!(bus.subscriptions.lock().unwrap().is_empty());
    }
}
