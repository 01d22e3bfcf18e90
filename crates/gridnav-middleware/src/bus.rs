//! Topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so every subscriber sees every
//! message and a slow subscriber never blocks the publisher.  Sending is
//! synchronous, so the single-threaded control loop can publish without a
//! running runtime; subscribers may drain with
//! [`TopicReceiver::try_recv`] or await [`TopicReceiver::recv`].
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Planning`] | The solved policy, published once at startup |
//! | [`Topic::Telemetry`] | Per-cycle readings, belief and position estimate |
//! | [`Topic::Lifecycle`] | Stalled cycles and the completion notice |
//!
//! Every event is also mirrored onto a firehose channel available through
//! [`EventBus::subscribe_all`], which is what recorders and log sinks use.

use gridnav_types::{Event, GridNavError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Planning,
    Telemetry,
    Lifecycle,
}

/// Shared event bus.  Clones share the same underlying channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    all: broadcast::Sender<Event>,
    planning: broadcast::Sender<Event>,
    telemetry: broadcast::Sender<Event>,
    lifecycle: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus whose channels each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        let (planning, _) = broadcast::channel(capacity);
        let (telemetry, _) = broadcast::channel(capacity);
        let (lifecycle, _) = broadcast::channel(capacity);
        Self {
            all,
            planning,
            telemetry,
            lifecycle,
        }
    }

    /// Publish `event` on `topic` (and the firehose).
    ///
    /// Returns the number of receivers that were handed the event.
    ///
    /// # Errors
    ///
    /// Returns [`GridNavError::Channel`] when nobody is listening on either
    /// channel.  Publishers that treat telemetry as best-effort ignore it.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, GridNavError> {
        let mirrored = self.all.send(event.clone()).unwrap_or(0);
        let routed = self.topic_sender(topic).send(event).unwrap_or(0);
        match mirrored + routed {
            0 => Err(GridNavError::Channel(format!("no subscribers for topic {topic:?}"))),
            n => Ok(n),
        }
    }

    /// Subscribe to a single topic.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic: Some(topic),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to every event regardless of topic.
    pub fn subscribe_all(&self) -> TopicReceiver {
        TopicReceiver {
            topic: None,
            receiver: self.all.subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Planning => &self.planning,
            Topic::Telemetry => &self.telemetry,
            Topic::Lifecycle => &self.lifecycle,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// Receiver bound to one topic, or to the firehose.
pub struct TopicReceiver {
    topic: Option<Topic>,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.  Lagged gaps are logged and skipped; `None`
    /// means the bus has shut down.
    pub async fn recv(&mut self) -> Option<Event> {
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

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// The topic this receiver is bound to; `None` for the firehose.
    pub fn topic(&self) -> Option<Topic> {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridnav_types::{Cell, Completion, EventPayload, PolicyLabel};

    fn stalled(source: &str) -> Event {
        Event::new(
            source,
            EventPayload::CycleStalled {
                estimate: Cell::new(1, 1),
                label: PolicyLabel::Wall,
            },
        )
    }

    #[tokio::test]
    async fn publish_and_receive_on_topic() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Lifecycle);

        let event = stalled("gridnav-runtime::test");
        bus.publish_to(Topic::Lifecycle, event.clone())?;

        let received = rx.recv().await.ok_or("no event received")?;
        assert_eq!(received.id, event.id);
        assert_eq!(rx.topic(), Some(Topic::Lifecycle));
        Ok(())
    }

    #[test]
    fn firehose_sees_every_topic() {
        let bus = EventBus::default();
        let mut all = bus.subscribe_all();

        bus.publish_to(Topic::Lifecycle, stalled("a")).unwrap();
        bus.publish_to(
            Topic::Lifecycle,
            Event::new(
                "b",
                EventPayload::Completed(Completion {
                    goal: Cell::new(0, 0),
                    probability: 0.9,
                    cycles: 4,
                }),
            ),
        )
        .unwrap();

        let sources: Vec<String> = all.drain().into_iter().map(|e| e.source).collect();
        assert_eq!(sources, vec!["a", "b"]);
        assert_eq!(all.topic(), None);
    }

    #[test]
    fn topic_subscriber_ignores_other_topics() {
        let bus = EventBus::default();
        let mut planning = bus.subscribe_to(Topic::Planning);
        let _telemetry = bus.subscribe_to(Topic::Telemetry);

        bus.publish_to(Topic::Telemetry, stalled("x")).unwrap();
        assert!(planning.try_recv().is_none());
    }

    #[test]
    fn publish_without_subscribers_is_channel_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Telemetry, stalled("nobody"));
        assert!(matches!(result, Err(GridNavError::Channel(_))));
    }

    #[test]
    fn receiver_counts_include_firehose() {
        let bus = EventBus::default();
        let _all = bus.subscribe_all();
        let _t1 = bus.subscribe_to(Topic::Telemetry);
        let _t2 = bus.subscribe_to(Topic::Telemetry);
        assert_eq!(bus.publish_to(Topic::Telemetry, stalled("x")).unwrap(), 3);
    }

    #[test]
    fn slow_subscriber_skips_lagged_events() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::Telemetry);
        for _ in 0..20 {
            let _ = bus.publish_to(Topic::Telemetry, stalled("flood"));
        }
        // The oldest 16 are gone; the remaining buffer is still readable.
        assert_eq!(slow.drain().len(), 4);
    }
}
