//! Responses and unsolicited updates received from the primary channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Object ───────────────────────────────────────────────────────────────────

/// Anything the primary channel can deliver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Object {
    Ok,
    Error(Error),
    OptionValueString {
        value: String,
    },
    Messages(Messages),
    UpdateAuthorizationState {
        authorization_state: AuthorizationState,
    },
    UpdateNewChat {
        chat: Chat,
    },
    UpdateChatTitle {
        chat_id: i64,
        title:   String,
    },
    UpdateFile {
        file: File,
    },
    /// Any `@type` not modelled above.
    #[serde(other)]
    Unknown,
}

impl Object {
    /// `true` if this is an `error` object.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The `@type` name of this object (`"unknown"` for unmodelled kinds).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ok                             => "ok",
            Self::Error(_)                       => "error",
            Self::OptionValueString { .. }       => "optionValueString",
            Self::Messages(_)                    => "messages",
            Self::UpdateAuthorizationState { .. } => "updateAuthorizationState",
            Self::UpdateNewChat { .. }           => "updateNewChat",
            Self::UpdateChatTitle { .. }         => "updateChatTitle",
            Self::UpdateFile { .. }              => "updateFile",
            Self::Unknown                        => "unknown",
        }
    }
}

/// A failed command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub code:    i32,
    pub message: String,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

// ─── AuthorizationState ───────────────────────────────────────────────────────

/// The login state reported by the primary channel.
///
/// Exactly one is current; each `updateAuthorizationState` replaces it whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum AuthorizationState {
    #[serde(rename = "authorizationStateWaitTdlibParameters")]
    WaitTdlibParameters,
    #[serde(rename = "authorizationStateWaitPhoneNumber")]
    WaitPhoneNumber,
    #[serde(rename = "authorizationStateWaitEmailAddress")]
    WaitEmailAddress,
    #[serde(rename = "authorizationStateWaitEmailCode")]
    WaitEmailCode,
    #[serde(rename = "authorizationStateWaitCode")]
    WaitCode,
    #[serde(rename = "authorizationStateWaitRegistration")]
    WaitRegistration,
    #[serde(rename = "authorizationStateWaitPassword")]
    WaitPassword {
        #[serde(default)]
        password_hint: String,
    },
    #[serde(rename = "authorizationStateWaitOtherDeviceConfirmation")]
    WaitOtherDeviceConfirmation {
        link: String,
    },
    #[serde(rename = "authorizationStateReady")]
    Ready,
    #[serde(rename = "authorizationStateLoggingOut")]
    LoggingOut,
    #[serde(rename = "authorizationStateClosing")]
    Closing,
    #[serde(rename = "authorizationStateClosed")]
    Closed,
    #[serde(other)]
    Unknown,
}

impl AuthorizationState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WaitTdlibParameters              => "awaiting-parameters",
            Self::WaitPhoneNumber                  => "awaiting-phone",
            Self::WaitEmailAddress                 => "awaiting-email",
            Self::WaitEmailCode                    => "awaiting-email-code",
            Self::WaitCode                         => "awaiting-code",
            Self::WaitRegistration                 => "awaiting-registration",
            Self::WaitPassword { .. }              => "awaiting-password",
            Self::WaitOtherDeviceConfirmation { .. } => "awaiting-other-device-confirmation",
            Self::Ready                            => "ready",
            Self::LoggingOut                       => "logging-out",
            Self::Closing                          => "closing",
            Self::Closed                           => "closed",
            Self::Unknown                          => "unknown",
        }
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

/// One page of chat history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default)]
    pub total_count: i32,
    #[serde(default)]
    pub messages:    Vec<Message>,
}

/// A chat message. `content` is kept as raw JSON; histfetch does not
/// interpret message bodies.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default)]
    pub chat_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<MessageSender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageReplyTo>,
    #[serde(default)]
    pub message_thread_id: i64,
    #[serde(default)]
    pub date: i32,
    #[serde(default)]
    pub edit_date: i32,
    #[serde(default)]
    pub content: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum MessageSender {
    MessageSenderUser { user_id: i64 },
    MessageSenderChat { chat_id: i64 },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum MessageReplyTo {
    MessageReplyToMessage { chat_id: i64, message_id: i64 },
    #[serde(other)]
    Unknown,
}

// ─── Chats & files ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id:    i64,
    #[serde(default)]
    pub title: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub id:    i32,
    #[serde(default)]
    pub local: LocalFile,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalFile {
    #[serde(default)]
    pub path: String,
}
