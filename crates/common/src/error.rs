//! Unified error type for supply-dash.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Backend API error (status={status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed payload from {path}: {reason}")]
    MalformedPayload { path: String, reason: String },

    #[error("Gave up after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Local store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a retry policy should attempt the operation again.
    ///
    /// Transport and server errors are retried alike. Malformed payloads are
    /// deterministic, so repeating the call cannot help.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Error::Cancelled
                | Error::MalformedPayload { .. }
                | Error::Config(_)
                | Error::ExhaustedRetries { .. }
        )
    }

    /// The innermost error, looking through retry exhaustion.
    pub fn root(&self) -> &Error {
        match self {
            Error::ExhaustedRetries { last, .. } => last.root(),
            other => other,
        }
    }

    /// Text suitable for an error panel.
    ///
    /// Server errors carrying a JSON `{"error": "..."}` body surface that
    /// message instead of the raw body.
    pub fn user_message(&self) -> String {
        match self.root() {
            Error::Api { status, message } => {
                let detail = serde_json::from_str::<serde_json::Value>(message)
                    .ok()
                    .and_then(|v| {
                        v.get("error")
                            .or_else(|| v.get("message"))
                            .and_then(|m| m.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| message.clone());
                format!("Server returned {}: {}", status, detail)
            }
            Error::Http(_) => "Could not reach the analytics backend. Newly uploaded data may still be processing; try again shortly.".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::Http("timeout".into()).is_retryable());
        assert!(Error::Api { status: 500, message: String::new() }.is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::MalformedPayload {
            path: "/x".into(),
            reason: "NaN".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_user_message_extracts_json_error() {
        let err = Error::ExhaustedRetries {
            attempts: 5,
            last: Box::new(Error::Api {
                status: 400,
                message: r#"{"error": "No file part"}"#.into(),
            }),
        };
        assert_eq!(err.user_message(), "Server returned 400: No file part");
    }

    #[test]
    fn test_user_message_plain_body() {
        let err = Error::Api {
            status: 502,
            message: "Bad Gateway".into(),
        };
        assert_eq!(err.user_message(), "Server returned 502: Bad Gateway");
    }
}
