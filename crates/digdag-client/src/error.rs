//! Client error types.

use std::path::PathBuf;

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (connect, TLS, timeout, body read).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration or an unsupported request method.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server answered with a status outside 2xx.
    #[error("Service error ({status}): {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Message built from the server's error payload, or the status line.
        message: String,
    },

    /// Response body was not the JSON shape we expected.
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Caller supplied an invalid argument.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local file could not be opened, created or written.
    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Compressed archive stream was malformed.
    #[error("Malformed archive: {0}")]
    Archive(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// HTTP status of a service error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Service { status, .. } => Some(*status),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Service { status: 404, .. })
    }

    /// Check if this is an authentication or authorization error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Service { status: 401 | 403, .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Service { status, .. } if *status >= 500)
    }

    /// Check if this is a configuration error (bad URL, bad method, missing token).
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidUrl(_))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error payload returned by the server on failure.
#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorEntry {
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Join all entries into one message, `None` when there are none.
    ///
    /// Each entry renders as its title, or `title\n\ndetail` when a detail is
    /// present; entries are separated by a single newline.
    pub(crate) fn message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| match e.detail.as_deref() {
                Some(detail) if !detail.is_empty() => format!("{}\n\n{}", e.title, detail),
                _ => e.title.clone(),
            })
            .collect();
        Some(parts.join("\n"))
    }
}

/// Build the message for a failed response.
///
/// Falls back to the status line when the body carries no usable error list.
pub(crate) fn service_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.message())
        .unwrap_or_else(|| status.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_message_joins_titles_and_details() {
        let body = br#"{"errors":[{"title":"T1"},{"title":"T2","detail":"D2"}]}"#;
        assert_eq!(
            service_message(StatusCode::BAD_REQUEST, body),
            "T1\nT2\n\nD2"
        );
    }

    #[test]
    fn test_message_falls_back_to_status_line() {
        let msg = service_message(StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>");
        assert_eq!(msg, "500 Internal Server Error");
    }

    #[test]
    fn test_empty_error_list_falls_back() {
        let msg = service_message(StatusCode::FORBIDDEN, br#"{"errors":[]}"#);
        assert!(msg.contains("403"));
        assert!(msg.contains("Forbidden"));
    }

    #[test]
    fn test_status_predicates() {
        let err = Error::Service {
            status: 404,
            message: "not found".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_server_error());
        assert_eq!(err.status(), Some(404));

        let err = Error::Service {
            status: 503,
            message: "down".into(),
        };
        assert!(err.is_server_error());
        assert!(Error::Config("x".into()).is_config_error());
    }
}
