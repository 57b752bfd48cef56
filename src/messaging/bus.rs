use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
/// Event bus for pub/sub messaging
///
/// Lets hosts observe playback without polling.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::events::PlaybackEvent;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<PlaybackEvent>,
}

/// Event bus for broadcasting events to subscribers
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<AtomicUsize>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<PlaybackEvent>, SubscriberId) {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.subscribers.write().push(Subscriber { id, sender: tx });

        (rx, id)
    }

    /// Unsubscribe from events
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: PlaybackEvent) {
        tracing::trace!("Publishing event: {}", event.description());

        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for subscriber in subscribers.iter() {
                // Unbounded sends only fail once the receiver is gone
                if subscriber.sender.try_send(event.clone()).is_err() {
                    closed.push(subscriber.id);
                }
            }
        }

        if !closed.is_empty() {
            self.subscribers.write().retain(|s| !closed.contains(&s.id));
        }
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Clear all subscribers
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::PlaybackId;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new();
        let (_rx, _id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_bus_unsubscribe() {
        let bus = EventBus::new();
        let (_rx, id) = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(id);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_bus_publish() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();

        bus.publish(PlaybackEvent::Completed {
            id: PlaybackId::new(0),
        });

        match rx.try_recv().unwrap() {
            PlaybackEvent::Completed { id } => assert_eq!(id, PlaybackId::new(0)),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new();
        let (rx1, _id1) = bus.subscribe();
        let (rx2, _id2) = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(PlaybackEvent::PoolClosed);

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let (rx, _id) = bus.subscribe();
        let (_keep, _id2) = bus.subscribe();
        drop(rx);

        bus.publish(PlaybackEvent::PoolClosed);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_event_bus_clone() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let (_rx, _id) = bus1.subscribe();
        assert_eq!(bus1.subscriber_count(), 1);
        assert_eq!(bus2.subscriber_count(), 1); // Shared state
    }
}
