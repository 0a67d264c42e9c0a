// PodFetch - Podcast Episode Download Client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Error types for PodFetch
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they come from so page controllers can decide
//! how to surface them:
//!
//! - **Transport**: the request never produced a response (`NetworkError`)
//! - **Application**: the server answered non-2xx, usually with a JSON
//!   `error` field (`ApiRequestFailed`)
//! - **Malformed response**: JSON was expected but something else arrived
//!   (`InvalidApiResponse`)
//! - **User input / UI state**: rejected before any request is sent
//!
//! Every failure is terminal for the action that caused it. Nothing here is
//! retried; the user re-triggers the action.

use thiserror::Error;

/// Result type alias using our ClientError type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for PodFetch
#[derive(Error, Debug)]
pub enum ClientError {
    // ===== Transport Errors =====

    /// Request could not be sent or the connection dropped
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        /// Whether the failure was a client-side timeout
        is_timeout: bool,
    },

    // ===== Application Errors =====

    /// Server answered with a non-2xx status
    #[error("API request failed: {message}")]
    ApiRequestFailed {
        /// Message from the body's `error` field, or a generic status line
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
        /// API path that failed
        endpoint: Option<String>,
    },

    /// Server returned something that is not the JSON we expected
    #[error("Invalid API response: {message}")]
    InvalidApiResponse {
        message: String,
        status_code: Option<u16>,
        /// Content-Type header as received
        content_type: Option<String>,
        /// First characters of the body for diagnostics
        body_snippet: Option<String>,
    },

    // ===== Download Errors =====

    /// Streaming or saving a file failed
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    // ===== Input / UI State Errors =====

    /// Generic input validation error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Action needs a user to be created or selected first
    #[error("No user selected. Create or select a user first")]
    NoCurrentUser,

    /// Batch action invoked with nothing selected
    #[error("Nothing selected for {0}")]
    EmptySelection(String),

    /// The same action is still running
    #[error("Action already in progress: {0}")]
    ActionInProgress(String),

    /// User declined a confirmation prompt
    #[error("Operation cancelled")]
    Cancelled,

    // ===== Configuration Errors =====

    /// Configuration is invalid or incomplete
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::InternalError(format!("Background task failed: {}", err))
    }
}

// Helper methods for creating common errors
impl ClientError {
    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        ClientError::InvalidInput(message.into())
    }

    /// Create an InternalError with a message
    pub fn internal<S: Into<String>>(message: S) -> Self {
        ClientError::InternalError(message.into())
    }

    /// Create an ApiRequestFailed error
    pub fn api_failed<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        endpoint: Option<String>,
    ) -> Self {
        ClientError::ApiRequestFailed {
            message: message.into(),
            status_code,
            endpoint,
        }
    }

    /// Create a NetworkError
    pub fn network_error<S: Into<String>>(message: S, is_timeout: bool) -> Self {
        ClientError::NetworkError {
            message: message.into(),
            is_timeout,
        }
    }

    /// Map a reqwest send/read failure into the transport category
    pub fn from_transport(err: reqwest::Error) -> Self {
        ClientError::NetworkError {
            message: err.to_string(),
            is_timeout: err.is_timeout(),
        }
    }

    /// The request never got an answer
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ClientError::NetworkError { .. } | ClientError::ReqwestError(_)
        )
    }

    /// The server answered and said no
    pub fn is_application_error(&self) -> bool {
        matches!(self, ClientError::ApiRequestFailed { .. })
    }

    /// The server answered with something unreadable
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidApiResponse { .. } | ClientError::SerdeJsonError(_)
        )
    }

    /// Rejected locally, before or instead of a request
    pub fn is_user_abort(&self) -> bool {
        matches!(
            self,
            ClientError::Cancelled
                | ClientError::ActionInProgress(_)
                | ClientError::EmptySelection(_)
        )
    }

    /// HTTP status code carried by the error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::ApiRequestFailed { status_code, .. }
            | ClientError::InvalidApiResponse { status_code, .. } => *status_code,
            ClientError::ReqwestError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get user-friendly error message suitable for an alert
    pub fn user_message(&self) -> String {
        match self {
            ClientError::NetworkError { message, is_timeout: true } => {
                format!("Request timed out: {}", message)
            }
            ClientError::NetworkError { message, .. } => {
                format!("Request failed: {}", message)
            }
            ClientError::ApiRequestFailed { message, .. } => message.clone(),
            ClientError::InvalidApiResponse { .. } | ClientError::SerdeJsonError(_) => {
                "Server error: the response was not valid JSON. See the log for details.".to_string()
            }
            ClientError::EmptySelection(action) => {
                format!("Select at least one file to {} first", action)
            }
            ClientError::ActionInProgress(action) => {
                format!("'{}' is still running, please wait", action)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let net = ClientError::network_error("connection refused", false);
        assert!(net.is_transport_error());
        assert!(!net.is_application_error());

        let api = ClientError::api_failed("User not found", Some(404), Some("/api/users".into()));
        assert!(api.is_application_error());
        assert_eq!(api.status_code(), Some(404));

        let bad = ClientError::InvalidApiResponse {
            message: "expected JSON".into(),
            status_code: Some(502),
            content_type: Some("text/html".into()),
            body_snippet: None,
        };
        assert!(bad.is_malformed_response());
        assert_eq!(bad.status_code(), Some(502));

        assert!(ClientError::Cancelled.is_user_abort());
        assert!(ClientError::EmptySelection("delete".into()).is_user_abort());
    }

    #[test]
    fn test_user_message_uses_server_text() {
        let api = ClientError::api_failed("Subscription not found", Some(404), None);
        assert_eq!(api.user_message(), "Subscription not found");

        let timeout = ClientError::network_error("deadline elapsed", true);
        assert!(timeout.user_message().starts_with("Request timed out"));

        let empty = ClientError::EmptySelection("delete".into());
        assert_eq!(empty.user_message(), "Select at least one file to delete first");
    }
}
