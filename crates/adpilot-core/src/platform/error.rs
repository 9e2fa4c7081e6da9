//! Failures reported by the advertising-platform collaborator.

use thiserror::Error;

/// Result type for collaborator calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Generic text shown when the platform gives no message of its own.
pub const GENERIC_FAILURE: &str = "the advertising platform could not complete the request";

/// A failed call into the advertising platform.
///
/// Rejections and transport failures are handled identically by the
/// engine (roll back, surface, no retry); they differ only in logs.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// Structured refusal from the platform.
    #[error("platform rejected the request: {}", .message.as_deref().unwrap_or(GENERIC_FAILURE))]
    Rejected {
        status: Option<u16>,
        message: Option<String>,
    },

    /// Expired or invalid grant.
    #[error("platform authorization failed: {0}")]
    Unauthorized(String),

    /// No response: connection failure, timeout, dropped body.
    #[error("platform unreachable: {0}")]
    Transport(String),

    /// The platform answered with a body the client could not decode.
    #[error("unexpected platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// A rejection carrying the platform's own message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            status: None,
            message: Some(message.into()),
        }
    }

    /// The text to show a user: the platform's message verbatim when it
    /// sent one, otherwise a generic failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
