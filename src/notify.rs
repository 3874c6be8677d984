use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-court broadcast of committed domain events.
pub struct EventHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a court. Creates the channel if needed.
    pub fn subscribe(&self, court_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(court_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event to its court's subscribers. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.court_id()) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a court's channel; current receivers see the stream close.
    pub fn remove(&self, court_id: &Ulid) {
        self.channels.remove(court_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = EventHub::new();
        let court_id = Ulid::new();
        let mut rx = hub.subscribe(court_id);

        let event = Event::ReservationConfirmed {
            id: Ulid::new(),
            court_id,
        };
        hub.send(&event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn events_for_other_courts_not_delivered() {
        let hub = EventHub::new();
        let court_id = Ulid::new();
        let mut rx = hub.subscribe(court_id);

        hub.send(&Event::NoShowMarked {
            id: Ulid::new(),
            court_id: Ulid::new(),
        });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = EventHub::new();
        // no subscriber, must not panic
        hub.send(&Event::NoShowMarked {
            id: Ulid::new(),
            court_id: Ulid::new(),
        });
    }

    #[tokio::test]
    async fn remove_closes_stream() {
        let hub = EventHub::new();
        let court_id = Ulid::new();
        let mut rx = hub.subscribe(court_id);
        hub.remove(&court_id);
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
    }
}
