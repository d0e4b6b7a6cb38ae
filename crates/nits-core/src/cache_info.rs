//! # Cache Info
//!
//! The static record served at `/nix-cache-info`. Fixed for the lifetime of
//! the process.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default Nix store directory.
pub const DEFAULT_STORE_DIR: &str = "/nix/store";

/// Default substituter priority advertised to clients.
pub const DEFAULT_PRIORITY: i32 = 1;

/// Descriptive capabilities of the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Store directory the cached paths belong to.
    pub store_dir: String,
    /// Whether clients may batch-query narinfos.
    pub want_mass_query: bool,
    /// Substituter priority; lower is preferred.
    pub priority: i32,
}

impl Default for CacheInfo {
    fn default() -> Self {
        Self {
            store_dir: DEFAULT_STORE_DIR.to_string(),
            want_mass_query: true,
            priority: DEFAULT_PRIORITY,
        }
    }
}

impl CacheInfo {
    /// Check the store directory is an absolute path without a trailing slash.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let dir = &self.store_dir;
        if !dir.starts_with('/') || dir.len() < 2 || dir.ends_with('/') {
            return Err(ValidationError::InvalidStoreDir(dir.clone()));
        }
        Ok(())
    }

    /// Render the `nix-cache-info` document.
    ///
    /// Every line is `Key: value`. Nix clients split on the colon, so the
    /// priority must be written `Priority: N` and never `Priority N`.
    pub fn to_text(&self) -> String {
        format!(
            "StoreDir: {}\nWantMassQuery: {}\nPriority: {}\n",
            self.store_dir,
            u8::from(self.want_mass_query),
            self.priority
        )
    }
}
