//! Commands sent to the primary channel.

use serde::{Deserialize, Serialize};

// ─── Function ─────────────────────────────────────────────────────────────────

/// A command understood by the primary channel.
///
/// Serialized as `{"@type": "<camelCaseName>", ...fields}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Function {
    GetOption {
        name: String,
    },
    SetTdlibParameters(TdlibParameters),
    SetAuthenticationPhoneNumber {
        phone_number: String,
    },
    SetAuthenticationEmailAddress {
        email_address: String,
    },
    CheckAuthenticationEmailCode {
        code: EmailAddressAuthentication,
    },
    CheckAuthenticationCode {
        code: String,
    },
    RegisterUser {
        first_name: String,
        last_name: String,
    },
    CheckAuthenticationPassword {
        password: String,
    },
    /// Load chats of the main chat list. An absent `chat_list` means "main".
    LoadChats {
        limit: i32,
    },
    /// Fetch messages older than `from_message_id` (`0` = newest first).
    GetChatHistory {
        chat_id:         i64,
        from_message_id: i64,
        offset:          i32,
        limit:           i32,
        only_local:      bool,
    },
}

impl Function {
    /// The `@type` name of this command.
    ///
    /// Use this instead of `Debug` when logging: some commands carry secrets.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetOption { .. }                     => "getOption",
            Self::SetTdlibParameters(_)                => "setTdlibParameters",
            Self::SetAuthenticationPhoneNumber { .. }  => "setAuthenticationPhoneNumber",
            Self::SetAuthenticationEmailAddress { .. } => "setAuthenticationEmailAddress",
            Self::CheckAuthenticationEmailCode { .. }  => "checkAuthenticationEmailCode",
            Self::CheckAuthenticationCode { .. }       => "checkAuthenticationCode",
            Self::RegisterUser { .. }                  => "registerUser",
            Self::CheckAuthenticationPassword { .. }   => "checkAuthenticationPassword",
            Self::LoadChats { .. }                     => "loadChats",
            Self::GetChatHistory { .. }                => "getChatHistory",
        }
    }
}

// ─── TdlibParameters ──────────────────────────────────────────────────────────

/// Session configuration sent while the peer waits for parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TdlibParameters {
    pub database_directory:   String,
    pub use_message_database: bool,
    pub use_secret_chats:     bool,
    pub api_id:               i32,
    pub api_hash:             String,
    pub system_language_code: String,
    pub device_model:         String,
    pub application_version:  String,
}

// ─── EmailAddressAuthentication ───────────────────────────────────────────────

/// Proof of ownership of the login email address.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum EmailAddressAuthentication {
    EmailAddressAuthenticationCode { code: String },
}
