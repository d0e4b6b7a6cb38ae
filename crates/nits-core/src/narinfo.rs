//! # NarInfo Text Model
//!
//! A narinfo is a list of `Key: Value` lines describing one store path:
//!
//! ```text
//! StorePath: /nix/store/abc123-hello
//! URL: nar/0c0xz5rp.nar.xz
//! Compression: xz
//! NarHash: sha256:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s
//! NarSize: 226552
//! References: abc123-hello def456-glibc
//! Sig: cache.example.org-1:6wzr1QlO...
//! ```
//!
//! The cache inspects only a handful of fields: `StorePath`, `URL`,
//! `NarHash`, `NarSize`, `References` and the `Sig` list. Every other line
//! is carried through untouched and in order, so re-serialization never
//! loses information the cache does not understand.
//!
//! ## Invariant
//!
//! Signatures are additive. [`NarInfo::add_signature`] refuses to add a
//! second signature under a name that is already present.

use std::fmt;

use crate::error::{NarInfoError, ValidationError};
use crate::key::NarKey;

/// One `Sig:` entry: `{name}:{base64 signature}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NarSignature {
    name: String,
    value: String,
}

impl NarSignature {
    /// Build a signature entry. The name must be non-empty and must not
    /// contain `:`.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self, NarInfoError> {
        let name = name.into();
        let value = value.into();
        if name.is_empty() || name.contains(':') || value.is_empty() {
            return Err(NarInfoError::InvalidSignature(format!("{name}:{value}")));
        }
        Ok(Self { name, value })
    }

    /// Parse the value of a `Sig:` line.
    pub fn parse(raw: &str) -> Result<Self, NarInfoError> {
        let (name, value) = raw
            .split_once(':')
            .ok_or_else(|| NarInfoError::InvalidSignature(raw.to_string()))?;
        Self::new(name, value)
    }

    /// Identity name of the signer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded signature bytes, as they appear after the `:`.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for NarSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// Parsed narinfo document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarInfo {
    /// Every non-`Sig` line, in document order.
    fields: Vec<(String, String)>,
    signatures: Vec<NarSignature>,

    store_path: String,
    url: String,
    nar_hash: String,
    nar_size: u64,
    references: Vec<String>,
}

const FIELD_SIG: &str = "Sig";

impl NarInfo {
    /// Parse a narinfo document.
    ///
    /// Blank lines are ignored. Required fields are `StorePath` (absolute),
    /// `URL`, `NarHash` and `NarSize`; the first occurrence of a field wins.
    pub fn parse(input: &[u8]) -> Result<Self, NarInfoError> {
        let text = std::str::from_utf8(input).map_err(|_| NarInfoError::NotUtf8)?;

        let mut fields = Vec::new();
        let mut signatures = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .filter(|(k, _)| !k.is_empty() && !k.contains(char::is_whitespace))
                .ok_or_else(|| NarInfoError::MalformedLine {
                    line: idx + 1,
                    content: line.to_string(),
                })?;
            // `References:` with nothing after it is valid.
            let value = value.strip_prefix(' ').unwrap_or(value);

            if key == FIELD_SIG {
                signatures.push(NarSignature::parse(value)?);
            } else {
                fields.push((key.to_string(), value.to_string()));
            }
        }

        let lookup = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        let store_path = lookup("StorePath").ok_or(NarInfoError::MissingField("StorePath"))?;
        if store_dir_of(&store_path).is_none() {
            return Err(NarInfoError::InvalidField {
                field: "StorePath",
                value: store_path,
            });
        }
        let url = lookup("URL").ok_or(NarInfoError::MissingField("URL"))?;
        let nar_hash = lookup("NarHash").ok_or(NarInfoError::MissingField("NarHash"))?;
        let nar_size_raw = lookup("NarSize").ok_or(NarInfoError::MissingField("NarSize"))?;
        let nar_size = nar_size_raw
            .trim()
            .parse::<u64>()
            .map_err(|_| NarInfoError::InvalidField {
                field: "NarSize",
                value: nar_size_raw.clone(),
            })?;
        let references = lookup("References")
            .map(|refs| refs.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            fields,
            signatures,
            store_path,
            url,
            nar_hash,
            nar_size,
            references,
        })
    }

    /// Value of the first line with the given key, signatures excluded.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn store_path(&self) -> &str {
        &self.store_path
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn nar_hash(&self) -> &str {
        &self.nar_hash
    }

    pub fn nar_size(&self) -> u64 {
        self.nar_size
    }

    /// Reference basenames as listed in the document.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Directory holding the store path, e.g. `/nix/store`.
    pub fn store_dir(&self) -> &str {
        // Validated during parse.
        store_dir_of(&self.store_path).unwrap_or("")
    }

    /// The blob this record points at.
    pub fn nar_key(&self) -> Result<NarKey, ValidationError> {
        NarKey::from_url(&self.url)
    }

    /// Canonical byte sequence signatures are computed over:
    /// `1;{StorePath};{NarHash};{NarSize};{refs}` with each reference
    /// expanded to a full store path and joined by commas.
    pub fn fingerprint(&self) -> String {
        let dir = self.store_dir();
        let refs = self
            .references
            .iter()
            .map(|r| format!("{dir}/{r}"))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "1;{};{};{};{}",
            self.store_path, self.nar_hash, self.nar_size, refs
        )
    }

    pub fn signatures(&self) -> &[NarSignature] {
        &self.signatures
    }

    /// Whether a signature under `name` is already present.
    pub fn is_signed_by(&self, name: &str) -> bool {
        self.signatures.iter().any(|s| s.name() == name)
    }

    /// Append a signature. Returns `false` and leaves the record untouched
    /// when a signature with the same name already exists.
    pub fn add_signature(&mut self, signature: NarSignature) -> bool {
        if self.is_signed_by(signature.name()) {
            return false;
        }
        self.signatures.push(signature);
        true
    }

    /// Serialize back to narinfo text.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for NarInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.fields {
            writeln!(f, "{key}: {value}")?;
        }
        for sig in &self.signatures {
            writeln!(f, "{FIELD_SIG}: {sig}")?;
        }
        Ok(())
    }
}

fn store_dir_of(store_path: &str) -> Option<&str> {
    if !store_path.starts_with('/') {
        return None;
    }
    let (dir, name) = store_path.rsplit_once('/')?;
    if dir.is_empty() || name.is_empty() {
        return None;
    }
    Some(dir)
}
