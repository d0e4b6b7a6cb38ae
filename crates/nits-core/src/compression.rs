//! # Compression Variants
//!
//! A blob is stored once per compression encoding. Each variant has a
//! narinfo name (`Compression: zstd`) and a URL/key extension
//! (`nar/{hash}.nar.zst`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Supported blob compression encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Xz,
    Bzip2,
    Zstd,
    Lzip,
    Lz4,
    #[serde(rename = "br")]
    Brotli,
}

impl Compression {
    /// Every supported variant.
    pub const ALL: [Compression; 6] = [
        Compression::Xz,
        Compression::Bzip2,
        Compression::Zstd,
        Compression::Lzip,
        Compression::Lz4,
        Compression::Brotli,
    ];

    /// Name used in a narinfo `Compression:` field.
    pub fn name(self) -> &'static str {
        match self {
            Self::Xz => "xz",
            Self::Bzip2 => "bzip2",
            Self::Zstd => "zstd",
            Self::Lzip => "lzip",
            Self::Lz4 => "lz4",
            Self::Brotli => "br",
        }
    }

    /// Extension used in blob URLs and store keys.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xz => "xz",
            Self::Bzip2 => "bz2",
            Self::Zstd => "zst",
            Self::Lzip => "lzip",
            Self::Lz4 => "lz4",
            Self::Brotli => "br",
        }
    }

    /// Parse a narinfo compression name (`bzip2`, `zstd`, ...).
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ValidationError::UnknownCompression(name.to_string()))
    }

    /// Parse a URL extension (`bz2`, `zst`, ...).
    pub fn from_extension(ext: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|c| c.extension() == ext)
            .ok_or_else(|| ValidationError::UnknownCompression(ext.to_string()))
    }
}

impl FromStr for Compression {
    type Err = ValidationError;

    /// Parses the URL extension form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
