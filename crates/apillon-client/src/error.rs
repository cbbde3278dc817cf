//! Client error types

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Application status reported when a directory does not exist.
pub const DIRECTORY_NOT_FOUND: i64 = 40406003;
/// Application status reported when a directory is already being deleted.
pub const DIRECTORY_DELETING: i64 = 40006007;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Caller-supplied argument failed a precondition
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure (connect, timeout, DNS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error status whose body is not a structured error envelope
    #[error("HTTP error {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Structured error reported by the API
    #[error("API error (status {status}): {message}")]
    Api { status: i64, message: String },

    /// The caller's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Every attempt failed with a retryable error
    #[error("Request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    /// A successful response broke the API contract
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Response body could not be decoded
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Signed upload endpoint answered with a non-2xx status
    #[error("Signed URL upload rejected ({status}): {body}")]
    SignedUrlRejected { status: u16, body: String },

    /// Directory does not exist
    #[error("Directory {directory} not found in bucket {bucket}")]
    DirectoryNotFound { bucket: String, directory: String },

    /// Directory is already marked for deletion
    #[error("Directory {directory} in bucket {bucket} is already marked for deletion")]
    DirectoryDeleting { bucket: String, directory: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure inside one phase of an upload session
    #[error("Upload session for bucket {bucket} failed while {phase}: {source}")]
    Session {
        phase: UploadPhase,
        bucket: String,
        #[source]
        source: Box<ClientError>,
    },

    /// Failure uploading a single file of a session
    #[error("Failed to upload file #{index} ({file_name}): {source}")]
    FileUpload {
        index: usize,
        file_name: String,
        #[source]
        source: Box<ClientError>,
    },
}

/// Coarse classification of a [`ClientError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Transport,
    Application,
    ProtocolViolation,
    UpstreamFailure,
    Cancelled,
    NotFound,
}

/// Phase of the session upload protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadPhase {
    /// Registering files and obtaining signed URLs
    Starting,
    /// Pushing file bytes to signed URLs
    Uploading,
    /// Closing the session
    Ending,
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => f.write_str("starting session"),
            Self::Uploading => f.write_str("uploading files"),
            Self::Ending => f.write_str("ending session"),
        }
    }
}

/// Error envelope returned by the API on failure
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ApiErrorBody {
    pub status: i64,
    pub message: String,
}

impl ClientError {
    /// Classify an error response body.
    ///
    /// A decodable `{status, message}` envelope becomes [`ClientError::Api`],
    /// anything else becomes [`ClientError::UnexpectedStatus`] with the raw text.
    pub fn from_error_body(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ApiErrorBody>(body) {
            Ok(envelope) => Self::Api {
                status: envelope.status,
                message: envelope.message,
            },
            Err(_) => Self::UnexpectedStatus {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    /// Kind of this error, looking through context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::InvalidInput,
            Self::Http(_) | Self::UnexpectedStatus { .. } | Self::RetriesExhausted { .. } => {
                ErrorKind::Transport
            }
            Self::Api { .. } | Self::DirectoryDeleting { .. } => ErrorKind::Application,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Protocol(_) | Self::Decode(_) => ErrorKind::ProtocolViolation,
            Self::SignedUrlRejected { .. } => ErrorKind::UpstreamFailure,
            Self::DirectoryNotFound { .. } | Self::NotFound(_) => ErrorKind::NotFound,
            Self::Session { source, .. } | Self::FileUpload { source, .. } => source.kind(),
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Only transport-class failures qualify: connection, timeout and body
    /// read errors, or an error status without an API envelope. Requests that
    /// could not be built and cancellation never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                !e.is_builder()
                    && !e.is_decode()
                    && (e.is_connect() || e.is_timeout() || e.is_request() || e.is_body())
            }
            Self::UnexpectedStatus { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a cancellation
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Application status code, if the server reported one
    pub fn api_status(&self) -> Option<i64> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Session { source, .. } | Self::FileUpload { source, .. } => source.api_status(),
            _ => None,
        }
    }

    /// Index of the file that stopped an upload session
    pub fn failed_file_index(&self) -> Option<usize> {
        match self {
            Self::FileUpload { index, .. } => Some(*index),
            Self::Session { source, .. } => source.failed_file_index(),
            _ => None,
        }
    }

    /// Phase an upload session failed in
    pub fn upload_phase(&self) -> Option<UploadPhase> {
        match self {
            Self::Session { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_api_error() {
        let body = br#"{"status": 404, "message": "x"}"#;

        match ClientError::from_error_body(404, body) {
            ClientError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "x");
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[rstest]
    #[case(502, "<html>Bad Gateway</html>")]
    #[case(500, "")]
    #[case(400, r#"{"error": "missing message"}"#)]
    fn test_undecodable_body_is_transport(#[case] status: u16, #[case] body: &str) {
        let error = ClientError::from_error_body(status, body.as_bytes());

        match &error {
            ClientError::UnexpectedStatus { status: s, body: b } => {
                assert_eq!(*s, status);
                assert_eq!(b, body);
            }
            other => panic!("Expected UnexpectedStatus, got {other:?}"),
        }
        assert_eq!(error.kind(), ErrorKind::Transport);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_kind_looks_through_context() {
        let error = ClientError::Session {
            phase: UploadPhase::Uploading,
            bucket: "b".into(),
            source: Box::new(ClientError::FileUpload {
                index: 1,
                file_name: "two.txt".into(),
                source: Box::new(ClientError::SignedUrlRejected {
                    status: 403,
                    body: "expired".into(),
                }),
            }),
        };

        assert_eq!(error.kind(), ErrorKind::UpstreamFailure);
        assert_eq!(error.failed_file_index(), Some(1));
        assert_eq!(error.upload_phase(), Some(UploadPhase::Uploading));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_builder_error_is_terminal() {
        let error = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(error.is_builder());

        let error = ClientError::from(error);
        assert_eq!(error.kind(), ErrorKind::Transport);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_cancellation_is_terminal() {
        assert!(!ClientError::Cancelled.is_retryable());
        assert!(ClientError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_api_error_is_terminal() {
        let error = ClientError::Api {
            status: 40406003,
            message: "gone".into(),
        };
        assert!(!error.is_retryable());
        assert_eq!(error.api_status(), Some(DIRECTORY_NOT_FOUND));
    }
}
