//! # Error Types
//!
//! Input validation and narinfo parsing errors. Both surface to clients as
//! `400 Bad Request`; neither is ever retried.

use thiserror::Error;

/// A request component failed validation before any store was touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The compression token is not one of the supported variants.
    #[error("unexpected compression: {0:?}")]
    UnknownCompression(String),

    /// A store hash was empty or contained characters outside `[a-z0-9]`.
    #[error("invalid store hash: {0:?}")]
    InvalidHash(String),

    /// A blob file name or narinfo `URL` did not have the `{hash}.nar.{ext}` shape.
    #[error("invalid nar reference: {0:?}")]
    InvalidNarReference(String),

    /// The configured store directory is not an absolute path.
    #[error("store dir must be an absolute path without trailing slash, got {0:?}")]
    InvalidStoreDir(String),
}

/// A narinfo document could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NarInfoError {
    /// The document is not UTF-8 text.
    #[error("narinfo is not valid UTF-8")]
    NotUtf8,

    /// A line did not have the `Key: Value` shape.
    #[error("line {line}: expected `Key: Value`, got {content:?}")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// A field the cache relies on is absent.
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// A field is present but its value is unusable.
    #[error("field {field} has invalid value {value:?}")]
    InvalidField {
        /// Field name as it appears in the document.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A `Sig:` line is not of the form `name:signature`.
    #[error("invalid signature {0:?}")]
    InvalidSignature(String),
}
