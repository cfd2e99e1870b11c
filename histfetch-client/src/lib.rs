//! # histfetch-client
//!
//! Logs in to a TDLib-speaking primary channel and streams one chat's history,
//! handing interactive login steps to a human operator over the Bot API.
//!
//! ## Pieces
//! - [`QueryDispatcher`]: request ids and per-request continuations
//! - [`auth::AuthorizationMachine`]: reacts to authorization-state updates,
//!   retries failed verification steps while the state is still current
//! - [`relay::Relay`]: operator prompts, reply matching and reply deadlines,
//!   run on its own task
//! - [`Fetcher::run`]: the drive loop pumping the primary channel
//!
//! ## Wiring
//! ```no_run
//! # async fn f() -> Result<(), Box<dyn std::error::Error>> {
//! use histfetch_client::{Config, Fetcher, HttpBotApi, ProcessChannel};
//! use histfetch_client::relay::{self, Relay, RelaySettings};
//!
//! let config = Config::load("data/secrets.json")?;
//! let channel = ProcessChannel::spawn(&config.bridge)?;
//! let api = HttpBotApi::new(&config.bot_api_base, &config.bot_token)?;
//!
//! let (prompter, inbox) = relay::prompt_channel();
//! let relay = Relay::new(api, RelaySettings::from(&config), inbox).spawn();
//!
//! let mut fetcher = Fetcher::new(config, channel, prompter, |m: &histfetch_types::Message| {
//!     println!("{}", m.id);
//! });
//! fetcher.run(-1001234567890, relay).await;
//! # Ok(()) }
//! ```

#![deny(unsafe_code)]

mod errors;
pub mod auth;
pub mod bot_api;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod drive;
pub mod relay;

pub use auth::AuthorizationMachine;
pub use bot_api::{BotApi, BotMessage, BotUpdate, HttpBotApi};
pub use channel::{PrimaryChannel, ProcessChannel, Response};
pub use config::Config;
pub use dispatcher::{Dispatch, Handler, QueryDispatcher};
pub use drive::{HistoryCursor, HistorySink, ShutdownSignal};
pub use errors::{ConfigError, RelayError};
pub use relay::{Prompter, Relay, RelayTask, Reply};

use std::collections::HashMap;

use histfetch_types::{Function, Object};
use tokio::sync::mpsc;

use auth::OperatorReply;

// ─── Fetcher ──────────────────────────────────────────────────────────────────

/// The drive context: owns the primary channel, the dispatcher, the
/// authorization state and the history cursor.
///
/// Everything here runs on one task. The relay reaches back in only through
/// the operator-reply queue, drained by [`Fetcher::drain_operator_replies`].
pub struct Fetcher<C> {
    config:      Config,
    channel:     C,
    dispatcher:  QueryDispatcher<Fetcher<C>>,
    auth:        AuthorizationMachine,
    prompter:    Prompter,
    replies_tx:  mpsc::UnboundedSender<OperatorReply>,
    replies_rx:  mpsc::UnboundedReceiver<OperatorReply>,
    cursor:      HistoryCursor,
    chat_titles: HashMap<i64, String>,
    sink:        Box<dyn HistorySink>,
    shutdown:    ShutdownSignal,
}

impl<C: PrimaryChannel + 'static> Fetcher<C> {
    pub fn new(
        config:   Config,
        channel:  C,
        prompter: Prompter,
        sink:     impl HistorySink + 'static,
    ) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let shutdown = ShutdownSignal::new(Some(config.stop_marker.clone()));
        Self {
            config,
            channel,
            dispatcher: QueryDispatcher::new(),
            auth: AuthorizationMachine::new(),
            prompter,
            replies_tx,
            replies_rx,
            cursor: HistoryCursor::default(),
            chat_titles: HashMap::new(),
            sink: Box::new(sink),
            shutdown,
        }
    }

    /// Send `function` on the primary channel, optionally with a continuation.
    pub fn send(&mut self, function: Function, handler: Option<Handler<Self>>) -> u64 {
        self.dispatcher.send(&mut self.channel, function, handler)
    }

    /// Feed one item received from the primary channel through the dispatcher.
    pub fn process_response(&mut self, response: Response) {
        dispatcher::on_response(self, response)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn config(&self) -> &Config { &self.config }

    pub fn channel(&self) -> &C { &self.channel }

    pub fn authorization(&self) -> &AuthorizationMachine { &self.auth }

    pub fn cursor(&self) -> HistoryCursor { self.cursor }

    /// Handle that requests shutdown of [`Fetcher::run`] from anywhere.
    pub fn shutdown_signal(&self) -> ShutdownSignal { self.shutdown.clone() }

    /// Continuations still waiting on the primary channel.
    pub fn pending_queries(&self) -> usize { self.dispatcher.pending() }

    /// Last known title of `chat_id`.
    pub fn chat_title(&self, chat_id: i64) -> Option<&str> {
        self.chat_titles.get(&chat_id).map(String::as_str)
    }

    // ── Updates ───────────────────────────────────────────────────────────

    fn process_update(&mut self, update: Object) {
        match update {
            Object::UpdateAuthorizationState { authorization_state } => {
                self.on_authorization_state(authorization_state);
            }
            Object::UpdateNewChat { chat } => {
                log::debug!("[histfetch] New chat {}: {:?}", chat.id, chat.title);
                self.chat_titles.insert(chat.id, chat.title);
            }
            Object::UpdateChatTitle { chat_id, title } => {
                log::debug!("[histfetch] Chat {chat_id} renamed to {title:?}");
                self.chat_titles.insert(chat_id, title);
            }
            Object::UpdateFile { file } => {
                log::debug!("[histfetch] File {} at {:?}", file.id, file.local.path);
            }
            other @ (Object::Ok | Object::Error(_) | Object::OptionValueString { .. } | Object::Messages(_)) => {
                log::debug!("[histfetch] Unsolicited {} ignored", other.kind());
            }
            Object::Unknown => log::trace!("[histfetch] Unhandled update kind"),
        }
    }
}

impl<C: PrimaryChannel + 'static> Dispatch for Fetcher<C> {
    fn dispatcher(&mut self) -> &mut QueryDispatcher<Self> { &mut self.dispatcher }

    fn on_event(&mut self, event: Object) { self.process_update(event) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histfetch_types::Chat;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Vec<(u64, Function)>);

    impl PrimaryChannel for Recorder {
        fn send(&mut self, request_id: u64, function: Function) { self.0.push((request_id, function)); }
        async fn receive(&mut self, _: Duration) -> Option<Response> { None }
    }

    fn fetcher() -> Fetcher<Recorder> {
        let (prompter, _inbox) = relay::prompt_channel();
        Fetcher::new(Config::default(), Recorder::default(), prompter, |_: &histfetch_types::Message| {})
    }

    fn event(object: Object) -> Response {
        Response { request_id: 0, object }
    }

    #[test]
    fn chat_titles_follow_updates() {
        let mut f = fetcher();
        f.process_response(event(Object::UpdateNewChat { chat: Chat { id: 7, title: "Ops".into() } }));
        assert_eq!(f.chat_title(7), Some("Ops"));
        f.process_response(event(Object::UpdateChatTitle { chat_id: 7, title: "Ops 2".into() }));
        assert_eq!(f.chat_title(7), Some("Ops 2"));
        assert_eq!(f.chat_title(8), None);
    }

    #[test]
    fn stray_events_are_ignored() {
        let mut f = fetcher();
        f.process_response(event(Object::Ok));
        f.process_response(event(Object::Unknown));
        assert!(f.channel().0.is_empty());
        assert!(!f.authorization().is_authorized());
    }
}
