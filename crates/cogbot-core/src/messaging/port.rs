use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::ReactionEvent,
    pagination::Page,
    Result,
};

/// Outbound messenger port.
///
/// Implementations must tolerate `clear_reactions` / `delete_message` on a
/// message that is already gone (treat as a no-op), but the core never calls
/// either twice for the same ephemeral session.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Send a titled page (an embed on platforms that have them).
    async fn send_page(&self, chat_id: ChatId, page: &Page) -> Result<MessageRef> {
        self.send_text(chat_id, &page.render()).await
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()>;
    async fn clear_reactions(&self, msg: MessageRef) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;
}

/// Inbound reaction events.
///
/// Subscribers only see events published after `subscribe` returns.
pub trait ReactionFeed: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ReactionEvent>;
}
