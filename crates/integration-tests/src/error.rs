//! Agent Error Types
//!
//! Maps handler failures to HTTP status codes with plain-text bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl AgentError {
    pub fn status(&self) -> StatusCode {
        match self {
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AgentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AgentError::NotFound("job not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AgentError::BadRequest("missing job ID".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AgentError::Internal("No path to region".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
