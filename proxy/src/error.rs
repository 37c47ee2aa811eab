// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for the DoH proxy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<dohproxy_common::Error> for AppError {
    fn from(err: dohproxy_common::Error) -> Self {
        if err.is_malformed() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use dohproxy_common::Error;

    #[test]
    fn crypto_failures_are_bad_requests() {
        for err in [
            Error::Truncated(3),
            Error::DecryptionFailed,
            Error::InvalidRequest("bad".to_string()),
            Error::InvalidKeyLength { expected: 32, got: 16 },
        ] {
            assert_eq!(AppError::from(err).status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn key_generation_failures_are_internal() {
        for err in [
            Error::KeyGeneration("rng".to_string()),
            Error::Certificate("sign".to_string()),
            Error::LockPoisoned,
        ] {
            assert_eq!(AppError::from(err).status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}
