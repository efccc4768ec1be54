// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types with helpful suggestions
//!
//! Only I/O-adjacent components fail. Search and pagination are pure and
//! treat empty collections as valid input.

use thiserror::Error;

/// Failure fetching records from the remote endpoint.
///
/// `Clone` because one in-flight fetch result is handed to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The endpoint answered with a non-success status.
    #[error("HTTP error! status: {status} ({url})")]
    Status { status: u16, url: String },

    /// Connection, timeout or other transport failure.
    #[error("Failed to fetch users: {0}")]
    Transport(String),

    /// The body was not the expected JSON shape.
    #[error("Failed to decode users payload: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether re-invoking the fetch path has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Transport(_) => true,
            FetchError::Decode(_) => false,
        }
    }

    /// Message shown next to the retry prompt.
    pub fn user_message(&self) -> String {
        if self.is_retryable() {
            format!("{self}\n\nSuggestion: check your connection and try again.")
        } else {
            self.to_string()
        }
    }
}

/// Failure reading or writing locally persisted state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// A stored value was not valid JSON for the requested type.
    #[error("Malformed value for key '{key}': {message}")]
    Parse { key: String, message: String },

    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file watch failed: {0}")]
    Watch(#[from] notify::Error),
}
