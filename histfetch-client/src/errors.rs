//! Error types for histfetch-client.
//!
//! None of these cross the drive/relay boundary at runtime: the relay logs
//! and absorbs [`RelayError`], and [`ConfigError`] only surfaces at startup.

use std::{fmt, io};

// ─── RelayError ───────────────────────────────────────────────────────────────

/// Failure of a Bot API call made by the interactive relay.
#[derive(Debug)]
pub enum RelayError {
    /// Network / HTTP failure.
    Http(reqwest::Error),
    /// The Bot API answered with `ok: false`.
    Api {
        /// `error_code` field, if present.
        code:        Option<i32>,
        /// `description` field, or a placeholder.
        description: String,
    },
    /// The response body was not the expected JSON.
    Decode(serde_json::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e)                       => write!(f, "HTTP error: {e}"),
            Self::Api { code: Some(c), description } => write!(f, "Bot API {c}: {description}"),
            Self::Api { code: None, description }    => write!(f, "Bot API: {description}"),
            Self::Decode(e)                     => write!(f, "decode error: {e}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e)   => Some(e),
            Self::Decode(e) => Some(e),
            Self::Api { .. } => None,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self { Self::Http(e) }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self { Self::Decode(e) }
}

// ─── ConfigError ──────────────────────────────────────────────────────────────

/// Errors returned by [`crate::Config::load`] and [`crate::Config::validate`].
#[derive(Debug)]
pub enum ConfigError {
    /// The secrets file could not be read.
    Io(io::Error),
    /// The secrets file is not valid JSON for [`crate::Config`].
    Parse(serde_json::Error),
    /// A value is present but unusable.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)        => write!(f, "cannot read config: {e}"),
            Self::Parse(e)     => write!(f, "cannot parse config: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e)      => Some(e),
            Self::Parse(e)   => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self { Self::Parse(e) }
}
