//! # histfetch-types
//!
//! The JSON vocabulary spoken on histfetch's primary channel.
//!
//! Two kinds of value cross the channel:
//! * [`Function`]: a command sent by the client, correlated by the
//!   `@extra` field carrying the request id.
//! * [`Object`]: a response to a command (same `@extra`), or an unsolicited
//!   update (no `@extra`, or `0`).
//!
//! Both are internally tagged on `@type` and use TDLib's camelCase type names.
//! Kinds this crate does not model decode to an explicit `Unknown` variant
//! rather than failing, so a newer peer never breaks the reader.

#![deny(unsafe_code)]

pub mod functions;
pub mod objects;

pub use functions::{EmailAddressAuthentication, Function, TdlibParameters};
pub use objects::{
    AuthorizationState, Chat, Error, File, LocalFile, Message, MessageReplyTo, MessageSender,
    Messages, Object,
};

use serde_json::Value;

/// Name of the correlation field added to every request and echoed back.
pub const EXTRA_FIELD: &str = "@extra";

/// Serialize `function` into a single JSON line tagged with `request_id`.
pub fn encode_request(request_id: u64, function: &Function) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(function)?;
    if let Value::Object(map) = &mut value {
        map.insert(EXTRA_FIELD.to_owned(), Value::from(request_id));
    }
    serde_json::to_string(&value)
}

/// A line that could not be decoded into an [`Object`].
///
/// `request_id` is whatever `@extra` held, read before the body is decoded,
/// so a caller can still complete the request a broken response belongs to.
/// It is `0` when the line is not a JSON object or carries no id.
#[derive(Debug)]
pub struct DecodeError {
    pub request_id: u64,
    pub source:     serde_json::Error,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "undecodable payload (#{}): {}", self.request_id, self.source)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Decode one JSON line into `(request_id, object)`.
///
/// A missing or non-numeric `@extra` yields request id `0`, i.e. an
/// unsolicited event.
pub fn decode_response(line: &str) -> Result<(u64, Object), DecodeError> {
    let mut value: Value = serde_json::from_str(line)
        .map_err(|source| DecodeError { request_id: 0, source })?;
    let request_id = match &mut value {
        Value::Object(map) => map.remove(EXTRA_FIELD).and_then(|v| v.as_u64()).unwrap_or(0),
        _ => 0,
    };
    let object = serde_json::from_value(value)
        .map_err(|source| DecodeError { request_id, source })?;
    Ok((request_id, object))
}
