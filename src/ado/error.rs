//! Error taxonomy for calls to the remote test-management system

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Why a remote call failed in a way worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    Network,
    Auth,
    RateLimit,
    Server,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransientKind::Network => "network",
            TransientKind::Auth => "auth",
            TransientKind::RateLimit => "rate-limit",
            TransientKind::Server => "server",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// The plan, suite or work item does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// The record exists but is not a test case
    #[error("work item {id} is a '{actual}', not a test case")]
    TypeMismatch { id: u32, actual: String },

    #[error("transient {kind} failure: {message}")]
    Transient { kind: TransientKind, message: String },

    /// Client error that retrying cannot fix
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Only transient failures are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, resource: &str, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("{} returned {}", resource, status)
        } else {
            format!("{} returned {}: {}", resource, status, truncate(body, 300))
        };

        match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound {
                resource: resource.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Transient {
                kind: TransientKind::Auth,
                message,
            },
            StatusCode::TOO_MANY_REQUESTS => RemoteError::Transient {
                kind: TransientKind::RateLimit,
                message,
            },
            s if s.is_server_error() => RemoteError::Transient {
                kind: TransientKind::Server,
                message,
            },
            s => RemoteError::Rejected {
                status: s.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Transient {
                kind: TransientKind::Network,
                message: err.to_string(),
            }
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
