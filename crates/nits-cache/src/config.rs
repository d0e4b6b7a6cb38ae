//! # Cache Configuration
//!
//! One explicit struct with named fields. The signing key is a constructor
//! argument, so a configuration without one cannot exist.
//!
//! Variables read by [`CacheConfig::from_env`]:
//!
//! | Variable                       | Default            |
//! |--------------------------------|--------------------|
//! | `NITS_CACHE_PRIVATE_KEY_FILE`  | required           |
//! | `NITS_CACHE_STORE_DIR`         | `/nix/store`       |
//! | `NITS_CACHE_WANT_MASS_QUERY`   | `true`             |
//! | `NITS_CACHE_PRIORITY`          | `1`                |
//! | `NITS_CACHE_BIND_ADDRESS`      | `127.0.0.1:3000`   |
//! | `NITS_CACHE_DATA_DIR`          | unset: in memory   |
//! | `NITS_CACHE_NAR_BUCKET`        | `nar`              |
//! | `NITS_CACHE_NARINFO_BUCKET`    | `nar-info`         |
//! | `NITS_CACHE_ACCESS_BUCKET`     | `nar-info-access`  |
//! | `NITS_CACHE_GC_MISSING_ACCESS` | `skip`             |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nits_core::{CacheInfo, ValidationError};
use nits_crypto::{CryptoError, SigningIdentity};
use nits_store::{Collections, StoreError};

use crate::gc::MissingAccessPolicy;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

pub const ENV_PRIVATE_KEY_FILE: &str = "NITS_CACHE_PRIVATE_KEY_FILE";
pub const ENV_STORE_DIR: &str = "NITS_CACHE_STORE_DIR";
pub const ENV_WANT_MASS_QUERY: &str = "NITS_CACHE_WANT_MASS_QUERY";
pub const ENV_PRIORITY: &str = "NITS_CACHE_PRIORITY";
pub const ENV_BIND_ADDRESS: &str = "NITS_CACHE_BIND_ADDRESS";
pub const ENV_DATA_DIR: &str = "NITS_CACHE_DATA_DIR";
pub const ENV_NAR_BUCKET: &str = "NITS_CACHE_NAR_BUCKET";
pub const ENV_NARINFO_BUCKET: &str = "NITS_CACHE_NARINFO_BUCKET";
pub const ENV_ACCESS_BUCKET: &str = "NITS_CACHE_ACCESS_BUCKET";
pub const ENV_GC_MISSING_ACCESS: &str = "NITS_CACHE_GC_MISSING_ACCESS";

/// Where the three collections live.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Memory,
    /// One directory per collection under this root.
    Filesystem(PathBuf),
}

#[derive(Clone)]
pub struct CacheConfig {
    pub info: CacheInfo,
    pub signing_key: Arc<SigningIdentity>,
    pub bind_address: String,
    pub backend: Backend,
    pub collections: Collections,
    pub missing_access: MissingAccessPolicy,
}

impl std::fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheConfig")
            .field("info", &self.info)
            .field("signing_key", &format_args!("{} [REDACTED]", self.signing_key.name()))
            .field("bind_address", &self.bind_address)
            .field("backend", &self.backend)
            .field("collections", &self.collections)
            .field("missing_access", &self.missing_access)
            .finish()
    }
}

impl CacheConfig {
    /// Defaults for everything except the key.
    pub fn new(signing_key: SigningIdentity) -> Self {
        Self {
            info: CacheInfo::default(),
            signing_key: Arc::new(signing_key),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            backend: Backend::Memory,
            collections: Collections::default(),
            missing_access: MissingAccessPolicy::Skip,
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let key_file = get(ENV_PRIVATE_KEY_FILE).ok_or(ConfigError::MissingKeyFile)?;
        let mut config = Self::new(load_signing_key(Path::new(&key_file))?);

        if let Some(dir) = get(ENV_STORE_DIR) {
            config.info.store_dir = dir;
        }
        if let Some(raw) = get(ENV_WANT_MASS_QUERY) {
            config.info.want_mass_query = parse_bool(ENV_WANT_MASS_QUERY, &raw)?;
        }
        if let Some(raw) = get(ENV_PRIORITY) {
            config.info.priority = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_PRIORITY, &raw, e))?;
        }
        if let Some(addr) = get(ENV_BIND_ADDRESS) {
            config.bind_address = addr;
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            config.backend = Backend::Filesystem(PathBuf::from(dir));
        }
        if let Some(name) = get(ENV_NAR_BUCKET) {
            config.collections.nar = name;
        }
        if let Some(name) = get(ENV_NARINFO_BUCKET) {
            config.collections.narinfo = name;
        }
        if let Some(name) = get(ENV_ACCESS_BUCKET) {
            config.collections.access = name;
        }
        if let Some(raw) = get(ENV_GC_MISSING_ACCESS) {
            config.missing_access = raw
                .parse()
                .map_err(|e: String| ConfigError::invalid(ENV_GC_MISSING_ACCESS, &raw, e))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.info.validate()?;
        self.collections.validate()?;
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::invalid(
                ENV_BIND_ADDRESS,
                &self.bind_address,
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Read a Nix secret key file.
pub fn load_signing_key(path: &Path) -> Result<SigningIdentity, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SigningIdentity::from_nix_secret_key(&raw)?)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(var, raw, "expected a boolean")),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("NITS_CACHE_PRIVATE_KEY_FILE environment variable is required")]
    MissingKeyFile,

    #[error("reading key file {}: {source}", .path.display())]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid signing key: {0}")]
    Key(#[from] CryptoError),

    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid cache info: {0}")]
    CacheInfo(#[from] ValidationError),

    #[error("invalid collections: {0}")]
    Collections(#[from] StoreError),
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
