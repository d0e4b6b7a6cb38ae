//! # Store Bundle
//!
//! The three stores the cache needs, opened together against one backend
//! and handed around as a single cloneable value.

use std::path::Path;
use std::sync::Arc;

use crate::backend::fs::{FsAccessLog, FsBlobStore, FsMetadataStore};
use crate::backend::memory::{MemoryAccessLog, MemoryBlobStore, MemoryMetadataStore};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::key::validate_key;
use crate::store::{AccessLog, BlobStore, MetadataStore};

/// Names of the three collections. Must be distinct and valid keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub nar: String,
    pub narinfo: String,
    pub access: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            nar: "nar".to_string(),
            narinfo: "nar-info".to_string(),
            access: "nar-info-access".to_string(),
        }
    }
}

impl Collections {
    pub fn validate(&self) -> Result<(), StoreError> {
        let names = [&self.nar, &self.narinfo, &self.access];
        for (i, name) in names.iter().enumerate() {
            validate_key(name)?;
            if names[..i].contains(name) {
                return Err(StoreError::DuplicateCollection(name.to_string()));
            }
        }
        Ok(())
    }
}

/// Blob, metadata, and access-log stores sharing one backend.
#[derive(Clone)]
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub access: Arc<dyn AccessLog>,
}

impl Stores {
    /// Fresh, empty in-memory stores.
    pub fn memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            blobs: Arc::new(MemoryBlobStore::new()),
            metadata: Arc::new(MemoryMetadataStore::new(Arc::clone(&clock))),
            access: Arc::new(MemoryAccessLog::new(clock)),
        }
    }

    /// Open (creating if needed) the three collection directories under `root`.
    pub async fn filesystem(
        root: &Path,
        collections: &Collections,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        collections.validate()?;
        tokio::fs::create_dir_all(root).await?;
        let blobs = FsBlobStore::open(root, &collections.nar).await?;
        let metadata = FsMetadataStore::open(root, &collections.narinfo, Arc::clone(&clock)).await?;
        let access = FsAccessLog::open(root, &collections.access, clock).await?;
        tracing::info!(
            root = %root.display(),
            nar = %collections.nar,
            narinfo = %collections.narinfo,
            access = %collections.access,
            "opened filesystem stores"
        );
        Ok(Self {
            blobs: Arc::new(blobs),
            metadata: Arc::new(metadata),
            access: Arc::new(access),
        })
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}
