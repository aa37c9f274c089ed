//! Topic-based event bus implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::types::{BehaviorEvent, ConversationEvent, DecisionEvent, PlanEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Observable agent activity (moved, spoke, performed)
    Behavior,
    /// Plan lifecycle inside the executor
    Plan,
    /// Tier decisions, reasoning requests and drops
    Decision,
    /// Two-party dialogue sessions
    Conversation,
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Behavior(BehaviorEvent),
    Plan(PlanEvent),
    Decision(DecisionEvent),
    Conversation(ConversationEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Behavior(_) => Topic::Behavior,
            Event::Plan(_) => Topic::Plan,
            Event::Decision(_) => Topic::Decision,
            Event::Conversation(_) => Topic::Conversation,
        }
    }
}

struct Channels {
    behavior: broadcast::Sender<Event>,
    plan: broadcast::Sender<Event>,
    decision: broadcast::Sender<Event>,
    conversation: broadcast::Sender<Event>,
}

impl Channels {
    fn sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Behavior => &self.behavior,
            Topic::Plan => &self.plan,
            Topic::Decision => &self.decision,
            Topic::Conversation => &self.conversation,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Publishing never blocks; events published with no
/// subscriber are dropped.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: Arc::new(Channels {
                behavior: broadcast::channel(capacity).0,
                plan: broadcast::channel(capacity).0,
                decision: broadcast::channel(capacity).0,
                conversation: broadcast::channel(capacity).0,
            }),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if self.channels.sender(topic).send(event).is_err() {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!(target: "npc::events", "No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.channels.sender(topic).subscribe()
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> std::collections::HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
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
    use npc_core::{AgentId, Position, Tick};

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = EventBus::with_capacity(8);
        let mut behavior = bus.subscribe(Topic::Behavior);
        let mut plan = bus.subscribe(Topic::Plan);

        bus.publish(Event::Behavior(BehaviorEvent::Moved {
            agent: AgentId(1),
            from: Position::new(0, 0),
            to: Position::new(1, 0),
            tick: Tick(3),
        }));

        let received = behavior.recv().await.unwrap();
        assert_eq!(received.topic(), Topic::Behavior);
        assert!(plan.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.publish(Event::Decision(DecisionEvent::Fallback {
            agent: AgentId(4),
            reason: "test".into(),
            tick: Tick(0),
        }));
    }
}
