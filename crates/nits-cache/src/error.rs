//! # Handler Errors
//!
//! [`CacheError`] implements `axum::response::IntoResponse`. Bodies are short
//! plain-text reasons; the reasons behind a 500 are logged and never sent to
//! the client.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use nits_core::{NarInfoError, ValidationError};
use nits_crypto::CryptoError;
use nits_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Unknown hash or blob (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad path component or malformed narinfo body (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Signing a narinfo failed (500). The record was not persisted.
    #[error("signing failed: {0}")]
    Signing(#[from] CryptoError),

    /// Store I/O failed (500).
    #[error("store error: {0}")]
    Store(StoreError),

    /// A stored narinfo no longer parses (500).
    #[error("stored record {key:?} is corrupt: {reason}")]
    CorruptRecord { key: String, reason: String },
}

impl CacheError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Signing(_) | Self::Store(_) | Self::CorruptRecord { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal error".to_string()
        } else {
            self.to_string()
        };
        (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::InvalidKey(_) => Self::BadRequest(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<ValidationError> for CacheError {
    fn from(err: ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<NarInfoError> for CacheError {
    fn from(err: NarInfoError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
