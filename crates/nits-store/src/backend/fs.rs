//! # Filesystem Backend
//!
//! Each collection is a directory under a data root; each key is a file in
//! that directory.
//!
//! - Writes go to a hidden temp file in the same directory and are then
//!   renamed over the destination, so a reader sees either the old or the new
//!   value and never a torn one.
//! - Last-write and last-access times are the file modification time, set
//!   explicitly from the [`Clock`] so tests can drive them.
//! - Names starting with `.` are temp files and are ignored by scans.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::key::validate_key;
use crate::store::{
    AccessLog, BlobObject, BlobReader, BlobStore, MetadataEntry, MetadataEvent, MetadataScan,
    MetadataStore, Operation,
};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One collection directory.
#[derive(Debug, Clone)]
struct Dir {
    name: String,
    path: PathBuf,
}

impl Dir {
    async fn open(root: &Path, name: &str) -> Result<Self, StoreError> {
        validate_key(name)?;
        let path = root.join(name);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    fn file(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.path.join(key))
    }

    /// The name leaves out the key so a maximum-length key still fits NAME_MAX.
    fn temp_file(&self) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path.join(format!(".tmp-{}-{n}", std::process::id()))
    }

    fn map_missing(&self, key: &str, err: std::io::Error) -> StoreError {
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::not_found(&self.name, key)
        } else {
            StoreError::Io(err)
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.file(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn modified(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        let path = self.file(key)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| self.map_missing(key, e))?;
        Ok(DateTime::<Utc>::from(meta.modified()?))
    }

    /// Write `contents` under `key` with its mtime set to `at`.
    async fn write_small(
        &self,
        key: &str,
        contents: Bytes,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let dest = self.file(key)?;
        let tmp = self.temp_file();
        let result = tokio::task::spawn_blocking({
            let tmp = tmp.clone();
            move || write_with_mtime(&tmp, &dest, &contents, SystemTime::from(at))
        })
        .await
        .map_err(|e| StoreError::Backend(format!("write task failed: {e}")))?;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result.map_err(StoreError::Io)
    }
}

fn write_with_mtime(
    tmp: &Path,
    dest: &Path,
    contents: &[u8],
    mtime: SystemTime,
) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::File::create(tmp)?;
    file.write_all(contents)?;
    file.flush()?;
    file.set_modified(mtime)?;
    drop(file);
    std::fs::rename(tmp, dest)
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: Dir,
}

impl FsBlobStore {
    pub async fn open(root: &Path, collection: &str) -> Result<Self, StoreError> {
        Ok(Self {
            dir: Dir::open(root, collection).await?,
        })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, mut reader: BlobReader) -> Result<u64, StoreError> {
        let dest = self.dir.file(key)?;
        let tmp = self.dir.temp_file();

        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            let n = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &dest).await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;

        match written {
            Ok(n) => Ok(n),
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(StoreError::Io(e))
            }
        }
    }

    async fn get(&self, key: &str) -> Result<BlobObject, StoreError> {
        let path = self.dir.file(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| self.dir.map_missing(key, e))?;
        let size = file.metadata().await?.len();
        Ok(BlobObject {
            size,
            reader: Box::new(file),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.dir.remove(key).await
    }
}

// ---------------------------------------------------------------------------
// Metadata store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    dir: Dir,
    clock: Arc<dyn Clock>,
}

impl FsMetadataStore {
    pub async fn open(
        root: &Path,
        collection: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            dir: Dir::open(root, collection).await?,
            clock,
        })
    }
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.dir.write_small(key, value, self.clock.now()).await
    }

    async fn get(&self, key: &str) -> Result<MetadataEntry, StoreError> {
        let path = self.dir.file(key)?;
        let value = tokio::fs::read(&path)
            .await
            .map_err(|e| self.dir.map_missing(key, e))?;
        let modified = self.dir.modified(key).await?;
        Ok(MetadataEntry {
            value: Bytes::from(value),
            modified,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.dir.remove(key).await
    }

    async fn scan(&self) -> Result<MetadataScan, StoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(dir = %self.dir.path.display(), "skipping non-UTF-8 file name");
                continue;
            };
            if name.starts_with('.') || !entry.file_type().await?.is_file() {
                continue;
            }
            keys.push(name);
        }

        let dir = self.dir.path.clone();
        let stream = futures::stream::iter(keys).then(move |key| {
            let path = dir.join(&key);
            async move {
                match tokio::fs::read(&path).await {
                    Ok(value) => Ok(MetadataEvent {
                        key,
                        value: Bytes::from(value),
                        operation: Operation::Put,
                    }),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MetadataEvent {
                        key,
                        value: Bytes::new(),
                        operation: Operation::Delete,
                    }),
                    Err(e) => Err(StoreError::Io(e)),
                }
            }
        });
        Ok(stream.boxed())
    }
}

// ---------------------------------------------------------------------------
// Access log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FsAccessLog {
    dir: Dir,
    clock: Arc<dyn Clock>,
}

impl FsAccessLog {
    pub async fn open(
        root: &Path,
        collection: &str,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            dir: Dir::open(root, collection).await?,
            clock,
        })
    }
}

#[async_trait]
impl AccessLog for FsAccessLog {
    async fn touch(&self, key: &str) -> Result<(), StoreError> {
        self.dir.write_small(key, Bytes::new(), self.clock.now()).await
    }

    async fn last_access(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        self.dir.modified(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.dir.remove(key).await
    }
}
