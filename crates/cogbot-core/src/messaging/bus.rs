use tokio::sync::broadcast;

use crate::messaging::{port::ReactionFeed, types::ReactionEvent};

const DEFAULT_CAPACITY: usize = 256;

/// In-process reaction fan-out.
///
/// The gateway adapter publishes every reaction it sees; each ephemeral
/// session holds its own receiver and filters by message.
#[derive(Clone, Debug)]
pub struct ReactionBus {
    tx: broadcast::Sender<ReactionEvent>,
}

impl Default for ReactionBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ReactionBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: ReactionEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ReactionFeed for ReactionBus {
    fn subscribe(&self) -> broadcast::Receiver<ReactionEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallerIdentity, ChatId, MessageId, MessageRef, UserId};

    fn event(id: u64) -> ReactionEvent {
        ReactionEvent {
            message: MessageRef {
                chat_id: ChatId(1),
                message_id: MessageId(id),
            },
            actor: CallerIdentity::member(UserId(9)),
            emoji: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn publishes_to_every_subscriber() {
        let bus = ReactionBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(event(5)), 2);
        assert_eq!(a.recv().await.unwrap().message.message_id, MessageId(5));
        assert_eq!(b.recv().await.unwrap().message.message_id, MessageId(5));
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = ReactionBus::new(4);
        assert_eq!(bus.publish(event(1)), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
