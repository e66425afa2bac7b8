//! Topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so every subscriber receives
//! every message and a slow subscriber never blocks a publisher.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Lifecycle`] | spawn, death, disconnect, kick, low health, transport errors |
//! | [`Topic::Mining`] | session start/stop, mined sites, deposits, search growth |

use quarry_types::{Event, EventPayload, LifecycleSignal, MiningEvent, QuarryError};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Buffered events per topic before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Signals about the agent's presence in the world.
    Lifecycle,
    /// Progress reported by the mining loop.
    Mining,
}

/// Shared event bus.  Clones share the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    lifecycle: broadcast::Sender<Event>,
    mining: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus whose topic channels each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (lifecycle, _) = broadcast::channel(capacity);
        let (mining, _) = broadcast::channel(capacity);
        Self { lifecycle, mining }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of receivers that were handed the event, or
    /// [`QuarryError::Channel`] when nobody is subscribed.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, QuarryError> {
        self.sender(topic)
            .send(event)
            .map_err(|_| QuarryError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    // -----------------------------------------------------------------------
    // Fire-and-forget helpers
    // -----------------------------------------------------------------------

    /// Publish a lifecycle signal.  Having no listener is not an error here.
    pub fn publish_lifecycle(&self, source: &str, signal: LifecycleSignal) {
        let delivered = self
            .publish_to(
                Topic::Lifecycle,
                Event::new(source, EventPayload::Lifecycle(signal)),
            )
            .unwrap_or(0);
        trace!(source, delivered, "lifecycle signal published");
    }

    /// Publish a mining progress event.  Having no listener is not an error.
    pub fn publish_mining(&self, source: &str, event: MiningEvent) {
        let delivered = self
            .publish_to(Topic::Mining, Event::new(source, EventPayload::Mining(event)))
            .unwrap_or(0);
        trace!(source, delivered, "mining event published");
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Lifecycle => &self.lifecycle,
            Topic::Mining => &self.mining,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to one [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event, surfacing lag to the caller.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next event, skipping over lag.  `None` once the bus is
    /// gone.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn publish_without_subscribers_is_an_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(
            Topic::Mining,
            Event::new("test", EventPayload::Mining(MiningEvent::Started)),
        );
        assert!(matches!(result, Err(QuarryError::Channel(_))));
    }

    #[test]
    fn helpers_tolerate_missing_subscribers() {
        let bus = EventBus::default();
        bus.publish_mining("test", MiningEvent::Stopped);
        bus.publish_lifecycle("test", LifecycleSignal::Spawn);
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut a = bus.subscribe_to(Topic::Lifecycle);
        let mut b = bus.subscribe_to(Topic::Lifecycle);
        assert_eq!(bus.subscriber_count(Topic::Lifecycle), 2);

        bus.publish_lifecycle("conn", LifecycleSignal::Death);

        for rx in [&mut a, &mut b] {
            let event = rx.recv().await?;
            assert!(matches!(
                event.payload,
                EventPayload::Lifecycle(LifecycleSignal::Death)
            ));
            assert_eq!(event.source, "conn");
        }
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = EventBus::default();
        let mut lifecycle = bus.subscribe_to(Topic::Lifecycle);
        let _mining = bus.subscribe_to(Topic::Mining);

        bus.publish_mining("loop", MiningEvent::Started);

        let result = tokio::time::timeout(Duration::from_millis(50), lifecycle.recv()).await;
        assert!(result.is_err(), "lifecycle subscriber saw a mining event");
    }

    #[tokio::test]
    async fn next_skips_lag() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe_to(Topic::Mining);
        for radius in 0..20 {
            bus.publish_mining("loop", MiningEvent::SearchRadiusGrown { radius });
        }
        let event = rx.next().await.unwrap();
        assert!(matches!(
            event.payload,
            EventPayload::Mining(MiningEvent::SearchRadiusGrown { radius: 16 })
        ));
    }

    #[tokio::test]
    async fn next_returns_none_when_bus_dropped() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Lifecycle);
        drop(bus);
        assert!(rx.next().await.is_none());
    }
}
