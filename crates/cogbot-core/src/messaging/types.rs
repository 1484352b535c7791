use crate::domain::{CallerIdentity, MessageRef};

/// Someone added a reaction to a message.
#[derive(Clone, Debug)]
pub struct ReactionEvent {
    pub message: MessageRef,
    pub actor: CallerIdentity,
    pub emoji: String,
}
