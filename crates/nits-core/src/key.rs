//! # Store Keys
//!
//! Newtypes for the identifiers the stores are keyed by.
//!
//! - [`StoreHash`] keys the metadata and access-log collections.
//! - [`NarKey`] keys the blob collection as `{hash}-{ext}`.
//!
//! Both reject malformed input at construction, so the characters that reach
//! a backend are always drawn from `[a-z0-9-]`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compression::Compression;
use crate::error::ValidationError;

/// Hash part of a store path (`abc123` in `/nix/store/abc123-hello`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreHash(String);

impl StoreHash {
    /// Validate and wrap a store hash. Only lowercase ASCII letters and
    /// digits are accepted.
    pub fn new(hash: impl Into<String>) -> Result<Self, ValidationError> {
        let hash = hash.into();
        if hash.is_empty()
            || !hash
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        {
            return Err(ValidationError::InvalidHash(hash));
        }
        Ok(Self(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StoreHash {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoreHash> for String {
    fn from(value: StoreHash) -> Self {
        value.0
    }
}

impl AsRef<str> for StoreHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one blob: content hash plus compression variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NarKey {
    hash: StoreHash,
    compression: Compression,
}

impl NarKey {
    pub fn new(hash: StoreHash, compression: Compression) -> Self {
        Self { hash, compression }
    }

    /// Parse the final path segment of a blob URL: `{hash}.nar.{ext}`.
    pub fn from_file_name(file_name: &str) -> Result<Self, ValidationError> {
        let (hash, ext) = file_name
            .split_once(".nar.")
            .ok_or_else(|| ValidationError::InvalidNarReference(file_name.to_string()))?;
        let hash = StoreHash::new(hash)?;
        let compression = Compression::from_extension(ext)?;
        Ok(Self::new(hash, compression))
    }

    /// Resolve a narinfo `URL` field (`nar/{hash}.nar.{ext}`).
    pub fn from_url(url: &str) -> Result<Self, ValidationError> {
        let file_name = url
            .strip_prefix("nar/")
            .ok_or_else(|| ValidationError::InvalidNarReference(url.to_string()))?;
        Self::from_file_name(file_name)
    }

    pub fn hash(&self) -> &StoreHash {
        &self.hash
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// The composite key used in the blob collection.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hash, self.compression.extension())
    }
}
