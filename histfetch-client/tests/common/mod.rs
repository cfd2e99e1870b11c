#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use histfetch_client::relay::{self, PromptInbox, Relay, RelaySettings};
use histfetch_client::{BotApi, BotMessage, BotUpdate, Config, Fetcher, PrimaryChannel, RelayError, Response};
use histfetch_types::{AuthorizationState, Function, Message, Object};

// ─── Primary channel fake ─────────────────────────────────────────────────────

type Responder = Box<dyn FnMut(u64, &Function) -> Vec<Response>>;

/// Records every command; `receive` hands out queued items in order.
pub struct ScriptedChannel {
    pub sent:  Vec<(u64, Function)>,
    queued:    VecDeque<Response>,
    responder: Option<Responder>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self { sent: Vec::new(), queued: VecDeque::new(), responder: None }
    }

    /// Answer commands as they are sent; returned items are queued for `receive`.
    pub fn with_responder(responder: impl FnMut(u64, &Function) -> Vec<Response> + 'static) -> Self {
        Self { responder: Some(Box::new(responder)), ..Self::new() }
    }

    pub fn push(&mut self, response: Response) {
        self.queued.push_back(response);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent.iter().map(|(_, f)| f.kind()).collect()
    }

    pub fn last(&self) -> &(u64, Function) {
        self.sent.last().expect("nothing sent")
    }
}

impl PrimaryChannel for ScriptedChannel {
    fn send(&mut self, request_id: u64, function: Function) {
        if let Some(responder) = self.responder.as_mut() {
            let replies = responder(request_id, &function);
            self.queued.extend(replies);
        }
        self.sent.push((request_id, function));
    }

    async fn receive(&mut self, max_wait: Duration) -> Option<Response> {
        if let Some(r) = self.queued.pop_front() {
            return Some(r);
        }
        if !max_wait.is_zero() {
            tokio::time::sleep(max_wait).await;
        }
        None
    }
}

pub fn event(object: Object) -> Response {
    Response { request_id: 0, object }
}

pub fn state(s: AuthorizationState) -> Response {
    event(Object::UpdateAuthorizationState { authorization_state: s })
}

pub fn failure(request_id: u64) -> Response {
    Response {
        request_id,
        object: Object::Error(histfetch_types::Error { code: 400, message: "PHONE_CODE_INVALID".into() }),
    }
}

pub fn messages(ids: impl IntoIterator<Item = i64>) -> Object {
    let messages: Vec<Message> = ids.into_iter().map(|id| Message { id, chat_id: 5, ..Default::default() }).collect();
    Object::Messages(histfetch_types::Messages { total_count: messages.len() as i32, messages })
}

// ─── Fetcher harness ──────────────────────────────────────────────────────────

pub type Collected = Arc<Mutex<Vec<i64>>>;

pub fn test_config() -> Config {
    Config {
        phone:       "+10000000000".into(),
        password:    "secret".into(),
        api_id:      1,
        api_hash:    "hash".into(),
        bot_token:   "1:abc".into(),
        user_id:     "42".into(),
        db:          "db".into(),
        stop_marker: std::env::temp_dir().join("histfetch-test-never-created"),
        ..Config::default()
    }
}

/// A fetcher over `channel` plus the relay's inbox and the ids it emitted.
pub fn fetcher(channel: ScriptedChannel) -> (Fetcher<ScriptedChannel>, PromptInbox, Collected) {
    let (prompter, inbox) = relay::prompt_channel();
    let collected: Collected = Arc::default();
    let sink = collected.clone();
    let f = Fetcher::new(test_config(), channel, prompter, move |m: &Message| sink.lock().unwrap().push(m.id));
    (f, inbox, collected)
}

// ─── Bot API fake ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct BotState {
    next_message_id:  i64,
    pub fail_sends:   bool,
    /// When set, every sent prompt is answered with this text on the next poll.
    pub auto_reply:   Option<String>,
    pub sent:         Vec<(String, String)>,
    pub offsets:      Vec<u64>,
    pub batches:      VecDeque<Vec<BotUpdate>>,
}

/// Scripted [`BotApi`]. `get_updates` pops one batch per call; with none left
/// it waits out the timeout and returns nothing.
#[derive(Clone, Default)]
pub struct MockBot {
    pub state: Arc<Mutex<BotState>>,
}

impl MockBot {
    pub fn with_first_message_id(id: i64) -> Self {
        let bot = Self::default();
        bot.state.lock().unwrap().next_message_id = id - 1;
        bot
    }

    pub fn push_batch(&self, batch: Vec<BotUpdate>) {
        self.state.lock().unwrap().batches.push_back(batch);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.state.lock().unwrap().offsets.clone()
    }

    pub fn last_message_id(&self) -> i64 {
        self.state.lock().unwrap().next_message_id
    }
}

impl BotApi for MockBot {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<i64, RelayError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_sends {
            return Err(RelayError::Api { code: Some(502), description: "Bad Gateway".into() });
        }
        s.next_message_id += 1;
        s.sent.push((chat_id.to_owned(), text.to_owned()));
        let id = s.next_message_id;
        if let Some(answer) = s.auto_reply.clone() {
            s.batches.push_back(vec![reply(id as u64, id, &answer)]);
        }
        Ok(id)
    }

    async fn get_updates(&self, offset: u64, timeout: Duration) -> Result<Vec<BotUpdate>, RelayError> {
        let batch = {
            let mut s = self.state.lock().unwrap();
            s.offsets.push(offset);
            s.batches.pop_front()
        };
        match batch {
            Some(b) => Ok(b),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Vec::new())
            }
        }
    }
}

pub fn reply(update_id: u64, target: i64, text: &str) -> BotUpdate {
    BotUpdate {
        update_id,
        message: Some(BotMessage {
            message_id:       update_id as i64 + 1000,
            text:             Some(text.into()),
            reply_to_message: Some(Box::new(BotMessage { message_id: target, ..Default::default() })),
        }),
    }
}

pub fn chatter(update_id: u64) -> BotUpdate {
    BotUpdate {
        update_id,
        message: Some(BotMessage { message_id: update_id as i64 + 1000, text: Some("hi".into()), reply_to_message: None }),
    }
}

// ─── Operator ─────────────────────────────────────────────────────────────────

/// The operator's side of login prompts: a relay over a [`MockBot`], stepped
/// one cycle at a time. Use under a paused clock.
pub struct Operator {
    pub bot:     MockBot,
    relay:       Relay<MockBot>,
    next_update: u64,
}

impl Operator {
    pub fn new(inbox: PromptInbox) -> Self {
        let bot = MockBot::with_first_message_id(100);
        let settings = RelaySettings {
            user_response_timeout: Duration::from_secs(5),
            updates_timeout:       Duration::from_secs(1),
        };
        Self { relay: Relay::new(bot.clone(), settings, inbox), bot, next_update: 1 }
    }

    /// Run one cycle; returns `(destination, text)` of the prompt it transmitted.
    pub async fn next_prompt(&mut self) -> Option<(String, String)> {
        let before = self.bot.sent().len();
        self.relay.run_cycle().await;
        self.bot.sent().get(before).cloned()
    }

    /// Reply to the most recent prompt and let the relay deliver it.
    pub async fn answer(&mut self, text: &str) {
        let target = self.bot.last_message_id();
        self.bot.push_batch(vec![reply(self.next_update, target, text)]);
        self.next_update += 1;
        self.relay.run_cycle().await;
    }

    /// Let the most recent prompt's deadline pass unanswered.
    pub async fn ignore(&mut self) {
        tokio::time::advance(Duration::from_secs(5)).await;
        self.relay.run_cycle().await;
    }
}
