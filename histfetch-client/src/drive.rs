//! The drive loop and history pagination.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use histfetch_types::{Function, Message, Object};

use crate::channel::PrimaryChannel;
use crate::dispatcher::Handler;
use crate::relay::RelayTask;
use crate::Fetcher;

/// Chats requested by the warm-up `loadChats`.
const LOAD_CHATS_LIMIT: i32 = 100;

// ─── HistoryCursor ────────────────────────────────────────────────────────────

/// Position of the history walk. `last_message_id == 0` means "newest".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryCursor {
    pub last_message_id: i64,
    pub in_flight:       bool,
}

// ─── ShutdownSignal ───────────────────────────────────────────────────────────

/// Cooperative stop request: an in-process flag or a marker file on disk.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    flag:   Arc<AtomicBool>,
    marker: Option<PathBuf>,
}

impl ShutdownSignal {
    pub fn new(marker: Option<PathBuf>) -> Self {
        Self { flag: Arc::new(AtomicBool::new(false)), marker }
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.marker.as_deref().is_some_and(|p| p.exists())
    }
}

// ─── HistorySink ──────────────────────────────────────────────────────────────

/// Receives every fetched message, newest first.
pub trait HistorySink {
    fn on_message(&mut self, message: &Message);
}

impl<F: FnMut(&Message)> HistorySink for F {
    fn on_message(&mut self, message: &Message) {
        self(message)
    }
}

// ─── Drive loop ───────────────────────────────────────────────────────────────

impl<C: PrimaryChannel + 'static> Fetcher<C> {
    /// Log in, then walk `chat_id`'s history until it is exhausted or shutdown
    /// is requested. Stops and joins `relay` before returning.
    pub async fn run(&mut self, chat_id: i64, relay: RelayTask) {
        self.send(Function::GetOption { name: "version".into() }, None);

        let mut chats_loaded = false;
        while !self.should_exit() {
            self.drain_operator_replies();

            if !self.auth.is_authorized() {
                let wait = self.config.receive_timeout();
                if let Some(response) = self.channel.receive(wait).await {
                    self.process_response(response);
                }
            } else if !chats_loaded {
                chats_loaded = true;
                self.load_chats();
                log::info!("[histfetch] Fetching history of chat {chat_id}");
            } else {
                self.pump_history(chat_id).await;
            }
        }

        log::info!("[histfetch] Stopping");
        relay.shutdown().await;
    }

    /// `true` once a stop was requested or the session is closed.
    pub fn should_exit(&self) -> bool {
        self.shutdown.is_requested() || self.auth.is_closed()
    }

    /// One post-authorization step: drain what is ready, then either request
    /// the next page or wait briefly for the one in flight.
    async fn pump_history(&mut self, chat_id: i64) {
        while let Some(response) = self.channel.receive(Duration::ZERO).await {
            self.process_response(response);
            if self.should_exit() {
                return;
            }
        }
        if !self.cursor.in_flight {
            self.request_history_page(chat_id);
            return;
        }
        let wait = self.config.idle_wait();
        if let Some(response) = self.channel.receive(wait).await {
            self.process_response(response);
        }
    }

    /// Ask for the page that follows the cursor.
    pub fn request_history_page(&mut self, chat_id: i64) {
        self.cursor.in_flight = true;
        let page = Function::GetChatHistory {
            chat_id,
            from_message_id: self.cursor.last_message_id,
            offset:          0,
            limit:           self.config.history_page_size,
            only_local:      false,
        };
        let handler: Handler<Self> = Box::new(|ctx: &mut Self, object: Object| ctx.on_history_page(object));
        self.send(page, Some(handler));
    }

    fn on_history_page(&mut self, object: Object) {
        self.cursor.in_flight = false;
        match object {
            Object::Messages(page) => {
                let Some(last_id) = page.messages.last().map(|m| m.id) else {
                    log::info!("[histfetch] History exhausted");
                    self.shutdown.request();
                    return;
                };
                for message in &page.messages {
                    self.sink.on_message(message);
                }
                log::debug!("[histfetch] Page of {} messages, cursor -> {last_id}", page.messages.len());
                self.cursor.last_message_id = last_id;
            }
            Object::Error(e) => {
                log::warn!("[histfetch] History request failed ({e}), retrying from {}", self.cursor.last_message_id);
            }
            other => log::debug!("[histfetch] Unexpected {} for a history page", other.kind()),
        }
    }

    fn load_chats(&mut self) {
        let handler: Handler<Self> = Box::new(|_: &mut Self, object: Object| match object {
            Object::Error(e) => log::debug!("[histfetch] loadChats: {e}"),
            _ => log::debug!("[histfetch] Chat list loaded"),
        });
        self.send(Function::LoadChats { limit: LOAD_CHATS_LIMIT }, Some(handler));
    }
}
