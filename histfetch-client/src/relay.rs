//! Human-in-the-loop relay over the Bot API.
//!
//! [`Prompter::send_message`] queues a prompt for the operator and returns at
//! once. A background [`Relay`] task works through a fixed cycle:
//!
//! 1. expire prompts whose reply deadline has passed (their continuation gets
//!    [`Reply::Unanswered`]);
//! 2. send at most one queued prompt and remember the id the Bot API gave it;
//! 3. if nothing was sent, long-poll for updates and hand every reply whose
//!    `reply_to_message` matches a pending prompt to that prompt's continuation.
//!
//! The prompt queue reaches the task through an mpsc channel; everything else
//! is owned by the task, so continuations always run with no lock held and may
//! queue new prompts themselves.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Config;
use crate::bot_api::{BotApi, BotMessage};

// ─── Reply ────────────────────────────────────────────────────────────────────

/// Outcome of a prompt, delivered exactly once to its continuation.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// The operator replied to the prompt with this message.
    Answered(BotMessage),
    /// No reply arrived before the deadline.
    Unanswered,
}

/// Continuation of a prompt.
pub type ReplyHandler = Box<dyn FnOnce(Reply) + Send + 'static>;

// ─── Prompts ──────────────────────────────────────────────────────────────────

/// A prompt waiting to be transmitted.
pub struct OutgoingPrompt {
    pub destination: String,
    pub text:        String,
    handler:         ReplyHandler,
}

impl std::fmt::Debug for OutgoingPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingPrompt")
            .field("destination", &self.destination)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// Sending half of the prompt queue. Cheap to clone.
#[derive(Clone)]
pub struct Prompter {
    tx: mpsc::UnboundedSender<OutgoingPrompt>,
}

impl Prompter {
    /// Queue `text` for `destination`; `handler` runs later on the relay task.
    pub fn send_message(
        &self,
        destination: impl Into<String>,
        text:        impl Into<String>,
        handler:     impl FnOnce(Reply) + Send + 'static,
    ) {
        let prompt = OutgoingPrompt {
            destination: destination.into(),
            text:        text.into(),
            handler:     Box::new(handler),
        };
        if let Err(e) = self.tx.send(prompt) {
            log::warn!("[relay] Relay is gone, prompt {:?} dropped", e.0.text);
        }
    }
}

/// Receiving half of the prompt queue, consumed by [`Relay::new`].
pub struct PromptInbox {
    rx: mpsc::UnboundedReceiver<OutgoingPrompt>,
}

impl PromptInbox {
    /// Take the next queued prompt without waiting.
    pub fn try_next(&mut self) -> Option<OutgoingPrompt> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected [`Prompter`] / [`PromptInbox`] pair.
pub fn prompt_channel() -> (Prompter, PromptInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Prompter { tx }, PromptInbox { rx })
}

// ─── PendingReplies ───────────────────────────────────────────────────────────

/// Transmitted prompts awaiting a reply, indexed by Bot API message id and by
/// deadline.
///
/// Prompts sharing a deadline live in one bucket. An id is present in both
/// indices or in neither.
#[derive(Default)]
pub struct PendingReplies {
    by_id:     HashMap<i64, (Instant, ReplyHandler)>,
    deadlines: BTreeMap<Instant, Vec<i64>>,
}

impl PendingReplies {
    pub fn new() -> Self { Self::default() }

    /// Register `handler` for `message_id`, replacing any earlier entry.
    pub fn insert(&mut self, message_id: i64, deadline: Instant, handler: ReplyHandler) {
        if let Some((old_deadline, _)) = self.by_id.insert(message_id, (deadline, handler)) {
            self.unlink(message_id, old_deadline);
        }
        self.deadlines.entry(deadline).or_default().push(message_id);
    }

    /// Remove every entry with deadline `<= now`, oldest bucket first.
    pub fn expire(&mut self, now: Instant) -> Vec<(i64, ReplyHandler)> {
        let mut expired = Vec::new();
        while let Some(bucket) = self.deadlines.first_entry() {
            if *bucket.key() > now {
                break;
            }
            for id in bucket.remove() {
                if let Some((_, handler)) = self.by_id.remove(&id) {
                    expired.push((id, handler));
                }
            }
        }
        expired
    }

    /// Remove and return the entry for `message_id`.
    pub fn take(&mut self, message_id: i64) -> Option<ReplyHandler> {
        let (deadline, handler) = self.by_id.remove(&message_id)?;
        self.unlink(message_id, deadline);
        Some(handler)
    }

    #[cfg(test)]
    fn contains(&self, message_id: i64) -> bool {
        self.by_id.contains_key(&message_id)
    }

    pub fn len(&self) -> usize { self.by_id.len() }

    pub fn is_empty(&self) -> bool { self.by_id.is_empty() }

    #[cfg(test)]
    fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.keys().next().copied()
    }

    fn unlink(&mut self, message_id: i64, deadline: Instant) {
        if let btree_map::Entry::Occupied(mut bucket) = self.deadlines.entry(deadline) {
            bucket.get_mut().retain(|id| *id != message_id);
            if bucket.get().is_empty() {
                bucket.remove();
            }
        }
    }
}

// ─── Relay ────────────────────────────────────────────────────────────────────

/// Timing knobs of the relay cycle.
#[derive(Clone, Copy, Debug)]
pub struct RelaySettings {
    /// How long a transmitted prompt waits for a reply.
    pub user_response_timeout: Duration,
    /// Server-side wait of each `getUpdates` long poll.
    pub updates_timeout:       Duration,
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            user_response_timeout: config.user_response_timeout(),
            updates_timeout:       config.updates_timeout(),
        }
    }
}

/// The relay state machine. Drive it with [`Relay::run_cycle`], or hand it to
/// its own task with [`Relay::spawn`].
pub struct Relay<B> {
    api:      B,
    settings: RelaySettings,
    inbox:    PromptInbox,
    queue:    VecDeque<OutgoingPrompt>,
    pending:  PendingReplies,
    offset:   u64,
}

impl<B: BotApi> Relay<B> {
    pub fn new(api: B, settings: RelaySettings, inbox: PromptInbox) -> Self {
        Self {
            api,
            settings,
            inbox,
            queue:   VecDeque::new(),
            pending: PendingReplies::new(),
            offset:  0,
        }
    }

    /// Next `getUpdates` offset: one past the largest update id seen.
    pub fn update_offset(&self) -> u64 { self.offset }

    /// Prompts transmitted and still awaiting a reply.
    pub fn pending(&self) -> usize { self.pending.len() }

    /// Prompts accepted but not yet transmitted.
    pub fn queued(&self) -> usize { self.queue.len() }

    /// One expire → send-one → poll round.
    pub async fn run_cycle(&mut self) {
        self.collect_inbox();
        self.expire_unanswered(Instant::now());
        if self.try_send_prompt().await {
            return;
        }
        self.poll_replies().await;
    }

    /// Move the relay onto its own task.
    pub fn spawn(mut self) -> RelayTask {
        let stop  = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            log::info!("[relay] Started");
            while !token.is_cancelled() {
                self.run_cycle().await;
            }
            log::info!("[relay] Stopped ({} queued, {} awaiting reply)", self.queue.len(), self.pending.len());
        });
        RelayTask { stop, handle }
    }

    fn collect_inbox(&mut self) {
        while let Some(prompt) = self.inbox.try_next() {
            self.queue.push_back(prompt);
        }
    }

    fn expire_unanswered(&mut self, now: Instant) {
        for (message_id, handler) in self.pending.expire(now) {
            log::info!("[relay] Prompt {message_id} unanswered before deadline");
            handler(Reply::Unanswered);
        }
    }

    /// Returns `true` if a prompt was dequeued, whether or not it went out.
    async fn try_send_prompt(&mut self) -> bool {
        let Some(prompt) = self.queue.pop_front() else {
            return false;
        };
        match self.api.send_message(&prompt.destination, &prompt.text).await {
            Ok(message_id) => {
                let deadline = Instant::now() + self.settings.user_response_timeout;
                log::debug!("[relay] Prompt sent as message {message_id}");
                self.pending.insert(message_id, deadline, prompt.handler);
            }
            // The continuation is dropped with the prompt; its caller is not told.
            Err(e) => log::warn!("[relay] Prompt {:?} dropped, send failed: {e}", prompt.text),
        }
        true
    }

    async fn poll_replies(&mut self) {
        let updates = match self.api.get_updates(self.offset, self.settings.updates_timeout).await {
            Ok(u)  => u,
            Err(e) => {
                log::warn!("[relay] getUpdates failed: {e}");
                return;
            }
        };

        let mut answered = Vec::new();
        for update in updates {
            self.offset = self.offset.max(update.update_id.saturating_add(1));
            let Some(message) = update.message else { continue };
            let Some(target)  = message.reply_target() else { continue };
            match self.pending.take(target) {
                Some(handler) => answered.push((handler, message)),
                None => log::debug!("[relay] Reply to unknown message {target} ignored"),
            }
        }
        for (handler, message) in answered {
            handler(Reply::Answered(message));
        }
    }
}

// ─── RelayTask ────────────────────────────────────────────────────────────────

/// Handle to a spawned [`Relay`].
pub struct RelayTask {
    stop:   CancellationToken,
    handle: JoinHandle<()>,
}

impl RelayTask {
    /// Stop the relay and wait for its task to finish.
    pub async fn shutdown(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            log::warn!("[relay] Task ended abnormally: {e}");
        }
    }
}
