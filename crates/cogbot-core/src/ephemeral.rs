//! Time-bounded "trash can" affordance on sent messages.
//!
//! After a message is sent, the controller adds a removal reaction to it. If
//! the user it was sent for (or a staff member) reacts with the same marker before
//! the timeout, the message is deleted. Otherwise the reaction is withdrawn
//! and the message stays.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::{JoinError, JoinHandle},
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::Config,
    domain::{ChatId, MessageRef, RoleId, UserId},
    errors::Error,
    messaging::{
        port::{MessagingPort, ReactionFeed},
        types::ReactionEvent,
    },
    pagination::Page,
    permission::PermissionEvaluator,
    Result,
};

pub const DEFAULT_MARKER: &str = "🗑️";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Stand-in deadline for timeouts the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// Timed out; the affordance was withdrawn and the message kept.
    Expired,
    /// A valid trigger arrived; the message was deleted.
    Consumed,
}

#[derive(Clone, Debug)]
pub struct EphemeralSession {
    pub message: MessageRef,
    pub author: UserId,
    pub expires_at: DateTime<Utc>,
    pub state: SessionState,
}

impl EphemeralSession {
    fn new(message: MessageRef, author: UserId, timeout: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            message,
            author,
            expires_at,
            state: SessionState::Active,
        }
    }
}

/// Handle to a running session.
///
/// Dropping it detaches the session; it still resolves on its own.
#[derive(Debug)]
pub struct SessionHandle {
    message: MessageRef,
    task: JoinHandle<Result<EphemeralSession>>,
}

impl SessionHandle {
    pub fn message(&self) -> MessageRef {
        self.message
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to resolve and return its terminal state.
    pub async fn finished(self) -> Result<EphemeralSession> {
        self.task
            .await
            .map_err(|e| Error::External(format!("ephemeral session task failed: {e}")))?
    }
}

/// Decides whether a reaction may remove the message.
#[derive(Clone, Debug)]
struct TriggerFilter {
    message: MessageRef,
    author: UserId,
    marker: String,
    permissions: PermissionEvaluator,
}

impl TriggerFilter {
    fn accepts(&self, event: &ReactionEvent) -> bool {
        event.message == self.message
            && event.emoji == self.marker
            && (event.actor.user_id == self.author || self.permissions.is_staff(&event.actor))
    }
}

#[derive(Clone)]
pub struct EphemeralController {
    messenger: Arc<dyn MessagingPort>,
    feed: Arc<dyn ReactionFeed>,
    permissions: PermissionEvaluator,
    marker: String,
    timeout: Duration,
}

impl EphemeralController {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        feed: Arc<dyn ReactionFeed>,
        staff_role_id: RoleId,
    ) -> Self {
        Self {
            messenger,
            feed,
            permissions: PermissionEvaluator::new(staff_role_id),
            marker: DEFAULT_MARKER.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn from_config(
        cfg: &Config,
        messenger: Arc<dyn MessagingPort>,
        feed: Arc<dyn ReactionFeed>,
    ) -> Self {
        Self::new(messenger, feed, cfg.staff_role_id)
            .with_marker(cfg.trash_emoji.clone())
            .with_timeout(cfg.trash_timeout)
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Put the removal affordance on `message` and start its session.
    ///
    /// Returns once the affordance is attached; the wait runs in the
    /// background. A failure to attach is returned here.
    pub async fn attach(
        &self,
        message: MessageRef,
        author: UserId,
        timeout: Duration,
    ) -> Result<SessionHandle> {
        // Subscribe first so a reaction racing the attach is not lost.
        let reactions = self.feed.subscribe();
        self.messenger.add_reaction(message, &self.marker).await?;

        let session = EphemeralSession::new(message, author, timeout);
        debug!(
            chat_id = message.chat_id.0,
            message_id = message.message_id.0,
            author = author.0,
            timeout_secs = timeout.as_secs_f64(),
            "ephemeral session started"
        );

        let filter = TriggerFilter {
            message,
            author,
            marker: self.marker.clone(),
            permissions: self.permissions,
        };
        let task = tokio::spawn(run_session(
            session,
            filter,
            reactions,
            self.messenger.clone(),
            timeout,
        ));

        Ok(SessionHandle { message, task })
    }

    /// Send `text` and let `author` (or staff) remove it within the default timeout.
    pub async fn send_ephemeral(
        &self,
        chat_id: ChatId,
        text: &str,
        author: UserId,
    ) -> Result<SessionHandle> {
        let msg = self.messenger.send_text(chat_id, text).await?;
        self.attach(msg, author, self.timeout).await
    }

    pub async fn send_page_ephemeral(
        &self,
        chat_id: ChatId,
        page: &Page,
        author: UserId,
    ) -> Result<SessionHandle> {
        let msg = self.messenger.send_page(chat_id, page).await?;
        self.attach(msg, author, self.timeout).await
    }
}

enum Race {
    TimedOut,
    Listener(std::result::Result<Option<ReactionEvent>, JoinError>),
}

async fn run_session(
    mut session: EphemeralSession,
    filter: TriggerFilter,
    reactions: broadcast::Receiver<ReactionEvent>,
    messenger: Arc<dyn MessagingPort>,
    timeout: Duration,
) -> Result<EphemeralSession> {
    let now = Instant::now();
    let deadline = now
        .checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE);
    let cancel = CancellationToken::new();

    let mut listener = tokio::spawn(listen(reactions, filter, cancel.clone()));
    let mut timer = tokio::spawn(sleep_until(deadline));

    // A trigger landing exactly on the deadline loses to the timer.
    let race = tokio::select! {
        biased;
        _ = &mut timer => Race::TimedOut,
        joined = &mut listener => Race::Listener(joined),
    };

    let trigger = match race {
        Race::TimedOut => {
            cancel.cancel();
            let _ = listener.await;
            None
        }
        Race::Listener(Ok(Some(event))) => {
            timer.abort();
            Some(event)
        }
        Race::Listener(other) => {
            // Feed closed (or listener died): only the timeout can end the session now.
            if let Err(e) = other {
                warn!(error = %e, "ephemeral listener task failed");
            }
            let _ = timer.await;
            None
        }
    };

    let msg = session.message;
    match trigger {
        Some(event) => {
            session.state = SessionState::Consumed;
            debug!(
                message_id = msg.message_id.0,
                actor = event.actor.user_id.0,
                "ephemeral session consumed; deleting message"
            );
            messenger.delete_message(msg).await.inspect_err(|e| {
                warn!(message_id = msg.message_id.0, error = %e, "failed to delete message");
            })?;
        }
        None => {
            session.state = SessionState::Expired;
            debug!(
                message_id = msg.message_id.0,
                "ephemeral session expired; withdrawing affordance"
            );
            messenger.clear_reactions(msg).await.inspect_err(|e| {
                warn!(message_id = msg.message_id.0, error = %e, "failed to clear reactions");
            })?;
        }
    }

    Ok(session)
}

async fn listen(
    mut reactions: broadcast::Receiver<ReactionEvent>,
    filter: TriggerFilter,
    cancel: CancellationToken,
) -> Option<ReactionEvent> {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => return None,
            r = reactions.recv() => r,
        };

        match received {
            Ok(event) if filter.accepts(&event) => return Some(event),
            Ok(event) => {
                if event.message == filter.message {
                    debug!(
                        message_id = filter.message.message_id.0,
                        actor = event.actor.user_id.0,
                        emoji = %event.emoji,
                        "ignoring reaction that may not remove this message"
                    );
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "reaction listener lagged behind the feed");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CallerIdentity, MessageId};
    use crate::messaging::bus::ReactionBus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const STAFF: RoleId = RoleId(500);
    const AUTHOR: UserId = UserId(10);
    const CHAT: ChatId = ChatId(1);

    #[derive(Default)]
    struct FakeMessenger {
        next_id: Mutex<u64>,
        sends: Mutex<Vec<String>>,
        reactions: Mutex<Vec<(MessageRef, String)>>,
        clears: Mutex<Vec<MessageRef>>,
        deletes: Mutex<Vec<MessageRef>>,
        fail_reactions: bool,
        fail_deletes: bool,
    }

    impl FakeMessenger {
        fn new() -> Self {
            Self {
                next_id: Mutex::new(100),
                ..Default::default()
            }
        }

        fn alloc(&self, chat_id: ChatId) -> MessageRef {
            let mut guard = self.next_id.lock().unwrap();
            let id = *guard;
            *guard += 1;
            MessageRef {
                chat_id,
                message_id: MessageId(id),
            }
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.sends.lock().unwrap().push(text.to_string());
            Ok(self.alloc(chat_id))
        }

        async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
            if self.fail_reactions {
                return Err(Error::External("missing permissions".to_string()));
            }
            self.reactions
                .lock()
                .unwrap()
                .push((msg, emoji.to_string()));
            Ok(())
        }

        async fn clear_reactions(&self, msg: MessageRef) -> Result<()> {
            self.clears.lock().unwrap().push(msg);
            Ok(())
        }

        async fn delete_message(&self, msg: MessageRef) -> Result<()> {
            if self.fail_deletes {
                return Err(Error::External("unknown message".to_string()));
            }
            self.deletes.lock().unwrap().push(msg);
            Ok(())
        }
    }

    /// A feed whose sender is already gone.
    struct ClosedFeed;

    impl ReactionFeed for ClosedFeed {
        fn subscribe(&self) -> broadcast::Receiver<ReactionEvent> {
            let (_tx, rx) = broadcast::channel(1);
            rx
        }
    }

    fn setup(api: FakeMessenger) -> (Arc<FakeMessenger>, ReactionBus, EphemeralController) {
        let api = Arc::new(api);
        let bus = ReactionBus::default();
        let ctl = EphemeralController::new(api.clone(), Arc::new(bus.clone()), STAFF);
        (api, bus, ctl)
    }

    fn msg(id: u64) -> MessageRef {
        MessageRef {
            chat_id: CHAT,
            message_id: MessageId(id),
        }
    }

    fn react(message: MessageRef, actor: CallerIdentity, emoji: &str) -> ReactionEvent {
        ReactionEvent {
            message,
            actor,
            emoji: emoji.to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn author_trigger_before_timeout_deletes_message() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let target = msg(1);

        let handle = ctl
            .attach(target, AUTHOR, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            api.reactions.lock().unwrap().as_slice(),
            &[(target, DEFAULT_MARKER.to_string())]
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        bus.publish(react(target, CallerIdentity::member(AUTHOR), DEFAULT_MARKER));

        let session = handle.finished().await.unwrap();
        assert_eq!(session.state, SessionState::Consumed);
        assert_eq!(api.deletes.lock().unwrap().as_slice(), &[target]);
        assert!(api.clears.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_still_accepts_trigger() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let target = msg(1);

        let handle = ctl.attach(target, AUTHOR, Duration::MAX).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!handle.is_finished());
        bus.publish(react(target, CallerIdentity::member(AUTHOR), DEFAULT_MARKER));

        let session = handle.finished().await.unwrap();
        assert_eq!(session.state, SessionState::Consumed);
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(api.deletes.lock().unwrap().as_slice(), &[target]);
        assert!(api.clears.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_trigger_expires_and_withdraws() {
        let (api, _bus, ctl) = setup(FakeMessenger::new());
        let target = msg(2);
        let start = Instant::now();

        let handle = ctl
            .attach(target, AUTHOR, Duration::from_secs(60))
            .await
            .unwrap();
        let session = handle.finished().await.unwrap();

        assert_eq!(session.state, SessionState::Expired);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(api.clears.lock().unwrap().as_slice(), &[target]);
        assert!(api.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn strangers_and_wrong_reactions_never_consume() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let target = msg(3);

        let handle = ctl
            .attach(target, AUTHOR, Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let stranger = CallerIdentity::member(UserId(99)).with_roles([RoleId(1), RoleId(2)]);
        bus.publish(react(target, stranger.clone(), DEFAULT_MARKER));
        // Owners are not staff for this purpose.
        bus.publish(react(target, stranger.owner(), DEFAULT_MARKER));
        // Right person, wrong emoji.
        bus.publish(react(target, CallerIdentity::member(AUTHOR), "👍"));
        // Right person and emoji, different message.
        bus.publish(react(msg(4), CallerIdentity::member(AUTHOR), DEFAULT_MARKER));

        let session = handle.finished().await.unwrap();
        assert_eq!(session.state, SessionState::Expired);
        assert!(api.deletes.lock().unwrap().is_empty());
        assert_eq!(api.clears.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn staff_may_remove_someone_elses_message() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let target = msg(5);

        let handle = ctl
            .attach(target, AUTHOR, Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        let moderator = CallerIdentity::member(UserId(7)).with_roles([STAFF]);
        bus.publish(react(target, moderator, DEFAULT_MARKER));

        let session = handle.finished().await.unwrap();
        assert_eq!(session.state, SessionState::Consumed);
        assert_eq!(api.deletes.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_after_timeout_is_ignored() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let target = msg(6);

        let handle = ctl
            .attach(target, AUTHOR, Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        bus.publish(react(target, CallerIdentity::member(AUTHOR), DEFAULT_MARKER));

        let session = handle.finished().await.unwrap();
        assert_eq!(session.state, SessionState::Expired);
        assert!(api.deletes.lock().unwrap().is_empty());
        assert_eq!(api.clears.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_are_independent() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let a = msg(7);
        let b = msg(8);

        let ha = ctl.attach(a, AUTHOR, Duration::from_secs(60)).await.unwrap();
        let hb = ctl.attach(b, UserId(11), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        bus.publish(react(b, CallerIdentity::member(UserId(11)), DEFAULT_MARKER));

        let sb = hb.finished().await.unwrap();
        let sa = ha.finished().await.unwrap();
        assert_eq!(sb.state, SessionState::Consumed);
        assert_eq!(sa.state, SessionState::Expired);
        assert_eq!(api.deletes.lock().unwrap().as_slice(), &[b]);
        assert_eq!(api.clears.lock().unwrap().as_slice(), &[a]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_feed_waits_for_timeout() {
        let api = Arc::new(FakeMessenger::new());
        let ctl = EphemeralController::new(api.clone(), Arc::new(ClosedFeed), STAFF);
        let start = Instant::now();

        let handle = ctl
            .attach(msg(9), AUTHOR, Duration::from_secs(20))
            .await
            .unwrap();
        let session = handle.finished().await.unwrap();

        assert_eq!(session.state, SessionState::Expired);
        assert!(start.elapsed() >= Duration::from_secs(20));
        assert_eq!(api.clears.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attach_failure_is_returned_to_caller() {
        let (api, bus, ctl) = setup(FakeMessenger {
            fail_reactions: true,
            ..FakeMessenger::new()
        });

        let err = ctl
            .attach(msg(10), AUTHOR, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(_)));
        // No background session was started.
        assert_eq!(bus.subscriber_count(), 0);
        assert!(api.clears.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_failure_surfaces_through_handle() {
        let (api, bus, ctl) = setup(FakeMessenger {
            fail_deletes: true,
            ..FakeMessenger::new()
        });
        let target = msg(11);

        let handle = ctl
            .attach(target, AUTHOR, Duration::from_secs(60))
            .await
            .unwrap();
        bus.publish(react(target, CallerIdentity::member(AUTHOR), DEFAULT_MARKER));

        assert!(handle.finished().await.is_err());
        assert!(api.clears.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_ephemeral_sends_then_attaches_custom_marker() {
        let (api, bus, ctl) = setup(FakeMessenger::new());
        let ctl = ctl.with_marker("❌").with_timeout(Duration::from_secs(5));

        let handle = ctl.send_ephemeral(CHAT, "hello", AUTHOR).await.unwrap();
        let sent = handle.message();
        assert_eq!(api.sends.lock().unwrap().as_slice(), &["hello".to_string()]);
        assert_eq!(
            api.reactions.lock().unwrap().as_slice(),
            &[(sent, "❌".to_string())]
        );

        bus.publish(react(sent, CallerIdentity::member(AUTHOR), DEFAULT_MARKER));
        let session = handle.finished().await.unwrap();
        assert_eq!(session.state, SessionState::Expired);
    }
}
