//! Stdout messenger + stdin reaction source for running the core locally.

use std::{
    io::Write,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};

use cogbot_core::{
    domain::{CallerIdentity, ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{bus::ReactionBus, port::MessagingPort, types::ReactionEvent},
    pagination::Page,
    Result,
};

pub struct ConsoleMessenger {
    next_id: AtomicU64,
    last_sent: AtomicU64,
}

impl Default for ConsoleMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            last_sent: AtomicU64::new(0),
        }
    }

    /// Most recently sent message, which stdin reactions are aimed at.
    pub fn last_sent(&self) -> Option<MessageId> {
        match self.last_sent.load(Ordering::SeqCst) {
            0 => None,
            id => Some(MessageId(id)),
        }
    }

    fn emit(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{text}")?;
        out.flush().map_err(Error::Io)
    }
}

#[async_trait]
impl MessagingPort for ConsoleMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.emit(&format!("── message #{id} ──\n{text}"))?;
        self.last_sent.store(id, Ordering::SeqCst);
        Ok(MessageRef {
            chat_id,
            message_id: MessageId(id),
        })
    }

    async fn send_page(&self, chat_id: ChatId, page: &Page) -> Result<MessageRef> {
        self.send_text(chat_id, &format!("[{}]\n{}", page.title, page.body))
            .await
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        self.emit(&format!(
            "(#{} {emoji}: type {emoji} to delete)",
            msg.message_id.0
        ))
    }

    async fn clear_reactions(&self, msg: MessageRef) -> Result<()> {
        self.emit(&format!("(#{} reactions cleared)", msg.message_id.0))
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.emit(&format!("(#{} deleted)", msg.message_id.0))
    }
}

/// Forward stdin lines as reactions by `viewer` on the last sent message.
pub fn spawn_stdin_reactions(
    bus: ReactionBus,
    chat_id: ChatId,
    viewer: CallerIdentity,
    last_sent: impl Fn() -> Option<MessageId> + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let emoji = line.trim();
            if emoji.is_empty() {
                continue;
            }
            let Some(message_id) = last_sent() else {
                continue;
            };
            bus.publish(ReactionEvent {
                message: MessageRef {
                    chat_id,
                    message_id,
                },
                actor: viewer.clone(),
                emoji: emoji.to_string(),
            });
        }
    })
}
