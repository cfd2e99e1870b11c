//! The secondary channel: a Bot API (HTTP/JSON, long polling) used to reach
//! the human operator.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::errors::RelayError;

/// Extra time granted to an HTTP round trip on top of the long-poll timeout.
const HTTP_SLACK: Duration = Duration::from_secs(10);

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok:          bool,
    result:      Option<T>,
    description: Option<String>,
    error_code:  Option<i32>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// One entry of a `getUpdates` batch.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct BotUpdate {
    pub update_id: u64,
    #[serde(default)]
    pub message:   Option<BotMessage>,
}

/// A chat message as seen by the bot.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct BotMessage {
    pub message_id: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub reply_to_message: Option<Box<BotMessage>>,
}

impl BotMessage {
    /// Id of the message this one replies to, if any.
    pub fn reply_target(&self) -> Option<i64> {
        self.reply_to_message.as_ref().map(|m| m.message_id)
    }

    /// The message text, or `""`.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

// ─── BotApi ───────────────────────────────────────────────────────────────────

/// The two operations the relay needs from the secondary channel.
pub trait BotApi: Send + Sync + 'static {
    /// Send `text` to `chat_id`; returns the id of the sent message.
    fn send_message(&self, chat_id: &str, text: &str)
        -> impl Future<Output = Result<i64, RelayError>> + Send;

    /// Long-poll for updates with `update_id >= offset`, waiting at most
    /// `timeout` on the server side.
    fn get_updates(&self, offset: u64, timeout: Duration)
        -> impl Future<Output = Result<Vec<BotUpdate>, RelayError>> + Send;
}

// ─── HttpBotApi ───────────────────────────────────────────────────────────────

/// [`BotApi`] over HTTPS using `reqwest`.
pub struct HttpBotApi {
    http:  reqwest::Client,
    base:  String,
    token: String,
}

impl HttpBotApi {
    /// `base` is the API root, e.g. `https://api.telegram.org`.
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder().build()?;
        let base = base.into().trim_end_matches('/').to_string();
        Ok(Self { http, base, token: token.into() })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base, self.token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method:  &str,
        body:    serde_json::Value,
        timeout: Duration,
    ) -> Result<T, RelayError> {
        let raw = self.http
            .post(self.method_url(method))
            .json(&body)
            .timeout(timeout)
            .send()
            .await?
            .text()
            .await?;
        let resp: ApiResponse<T> = serde_json::from_str(&raw)?;
        match (resp.ok, resp.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(RelayError::Api {
                code:        resp.error_code,
                description: resp.description.unwrap_or_else(|| format!("{method} failed")),
            }),
        }
    }
}

impl BotApi for HttpBotApi {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<i64, RelayError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        let sent: SentMessage = self.call("sendMessage", body, HTTP_SLACK).await?;
        log::debug!("[bot-api] sendMessage -> message_id={}", sent.message_id);
        Ok(sent.message_id)
    }

    async fn get_updates(&self, offset: u64, timeout: Duration) -> Result<Vec<BotUpdate>, RelayError> {
        let body = json!({
            "offset":          offset,
            "timeout":         timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        self.call("getUpdates", body, timeout + HTTP_SLACK).await
    }
}
