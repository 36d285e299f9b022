//! SDK Error Types

use thiserror::Error;

/// SDK Result type
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK Error
///
/// Server and transport failures are surfaced as-is; the client never
/// retries or recovers locally.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The addressed job (or other resource) does not exist.
    ///
    /// The rendered message always contains `"not found"`.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The server rejected the submitted document.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Any other non-2xx response.
    #[error("Unexpected response code {status}: {message}")]
    Request { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid header {name}: {value}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SdkError {
    /// Classify a non-2xx response by status code and body text.
    ///
    /// 404 is always `NotFound` and 400/422 always `Validation`. Some
    /// failures come back through the server's generic error path (500 with
    /// a "... not found" or "... validation failed" body), so other statuses
    /// are classified by that text.
    pub fn from_response(status: u16, body: impl Into<String>) -> Self {
        let message = body.into().trim().to_string();
        let lowered = message.to_ascii_lowercase();
        match status {
            404 => SdkError::NotFound(message),
            400 | 422 => SdkError::Validation(message),
            _ if lowered.contains("not found") => SdkError::NotFound(message),
            _ if lowered.contains("validation failed") => SdkError::Validation(message),
            _ => SdkError::Request { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SdkError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, SdkError::Validation(_))
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SdkError::Timeout
        } else if e.is_builder() {
            SdkError::InvalidUrl(e.to_string())
        } else if e.is_decode() {
            SdkError::Transport(format!("Failed to read response body: {}", e))
        } else {
            SdkError::Transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for SdkError {
    fn from(e: url::ParseError) -> Self {
        SdkError::InvalidUrl(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_404_is_not_found() {
        let err = SdkError::from_response(404, "job not found\n");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_not_found_text_always_present() {
        // Even an empty 404 body renders with the marker callers branch on
        let err = SdkError::from_response(404, "");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_rpc_path_not_found_is_not_found() {
        let err = SdkError::from_response(500, "job not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rpc_path_validation_failure_is_validation() {
        let err = SdkError::from_response(500, "1 error occurred: job validation failed");
        assert!(err.is_validation());

        let err = SdkError::from_response(500, "No path to region");
        assert!(matches!(err, SdkError::Request { status: 500, .. }));
    }

    #[test]
    fn test_bad_request_is_validation() {
        let err = SdkError::from_response(400, "missing job ID");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation error: missing job ID");
    }

    #[test]
    fn test_other_status_is_request_error() {
        let err = SdkError::from_response(503, "no cluster leader");
        match err {
            SdkError::Request { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "no cluster leader");
            }
            other => panic!("expected request error, got {:?}", other),
        }
    }
}
