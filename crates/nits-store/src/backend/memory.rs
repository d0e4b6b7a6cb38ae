//! # In-Memory Backend
//!
//! Every collection is an `Arc<parking_lot::RwLock<HashMap>>`. Locks are
//! never held across `.await`, so the synchronous lock is safe inside async
//! handlers. Contents are lost when the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::io::AsyncReadExt;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::key::validate_key;
use crate::store::{
    AccessLog, BlobObject, BlobReader, BlobStore, MetadataEntry, MetadataEvent, MetadataScan,
    MetadataStore, Operation,
};

/// Thread-safe, cloneable keyed collection.
#[derive(Debug)]
struct Collection<T: Clone + Send + Sync> {
    name: &'static str,
    data: Arc<RwLock<HashMap<String, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Collection<T> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn insert(&self, key: &str, value: T) -> Result<(), StoreError> {
        validate_key(key)?;
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<T, StoreError> {
        validate_key(key)?;
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(self.name, key))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.data.write().remove(key);
        Ok(())
    }

    fn snapshot(&self) -> Vec<(String, T)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.data.read().len()
    }
}

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    blobs: Collection<Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Collection::new("nar"),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, mut reader: BlobReader) -> Result<u64, StoreError> {
        validate_key(key)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let size = buf.len() as u64;
        self.blobs.insert(key, Bytes::from(buf))?;
        Ok(size)
    }

    async fn get(&self, key: &str) -> Result<BlobObject, StoreError> {
        let bytes = self.blobs.get(key)?;
        Ok(BlobObject {
            size: bytes.len() as u64,
            reader: Box::new(std::io::Cursor::new(bytes)),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.blobs.remove(key)
    }
}

// ---------------------------------------------------------------------------
// Metadata store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryMetadataStore {
    entries: Collection<MetadataEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryMetadataStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Collection::new("nar-info"),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        let entry = MetadataEntry {
            value,
            modified: self.clock.now(),
        };
        self.entries.insert(key, entry)
    }

    async fn get(&self, key: &str) -> Result<MetadataEntry, StoreError> {
        self.entries.get(key)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key)
    }

    async fn scan(&self) -> Result<MetadataScan, StoreError> {
        let events: Vec<Result<MetadataEvent, StoreError>> = self
            .entries
            .snapshot()
            .into_iter()
            .map(|(key, entry)| {
                Ok(MetadataEvent {
                    key,
                    value: entry.value,
                    operation: Operation::Put,
                })
            })
            .collect();
        Ok(futures::stream::iter(events).boxed())
    }
}

// ---------------------------------------------------------------------------
// Access log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MemoryAccessLog {
    touched: Collection<DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl MemoryAccessLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            touched: Collection::new("nar-info-access"),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.touched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccessLog for MemoryAccessLog {
    async fn touch(&self, key: &str) -> Result<(), StoreError> {
        self.touched.insert(key, self.clock.now())
    }

    async fn last_access(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        self.touched.get(key)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.touched.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use futures::TryStreamExt;

    fn clock() -> ManualClock {
        ManualClock::new(
            DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        )
    }

    #[tokio::test]
    async fn blob_put_get_delete() {
        let store = MemoryBlobStore::new();
        let written = store
            .put("abc-zst", Box::new(&b"nar bytes"[..]))
            .await
            .unwrap();
        assert_eq!(written, 9);

        let mut obj = store.get("abc-zst").await.unwrap();
        assert_eq!(obj.size, 9);
        let mut buf = Vec::new();
        obj.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"nar bytes");

        store.delete("abc-zst").await.unwrap();
        assert!(store.get("abc-zst").await.unwrap_err().is_not_found());
        store.delete("abc-zst").await.unwrap();
    }

    #[tokio::test]
    async fn blob_put_overwrites() {
        let store = MemoryBlobStore::new();
        store.put("k-xz", Box::new(&b"first"[..])).await.unwrap();
        store.put("k-xz", Box::new(&b"2"[..])).await.unwrap();
        assert_eq!(store.get("k-xz").await.unwrap().size, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn metadata_records_write_time() {
        let clock = clock();
        let store = MemoryMetadataStore::new(Arc::new(clock.clone()));
        store.put("abc", Bytes::from_static(b"v1")).await.unwrap();
        let first = store.get("abc").await.unwrap();

        clock.advance(Duration::minutes(5));
        store.put("abc", Bytes::from_static(b"v2")).await.unwrap();
        let second = store.get("abc").await.unwrap();

        assert_eq!(second.value, Bytes::from_static(b"v2"));
        assert_eq!(second.modified - first.modified, Duration::minutes(5));
    }

    #[tokio::test]
    async fn scan_yields_snapshot_then_ends() {
        let store = MemoryMetadataStore::new(Arc::new(clock()));
        for key in ["a", "b", "c"] {
            store.put(key, Bytes::from(key)).await.unwrap();
        }
        let mut events: Vec<MetadataEvent> = store.scan().await.unwrap().try_collect().await.unwrap();
        events.sort_by(|x, y| x.key.cmp(&y.key));

        let keys: Vec<_> = events.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert!(events.iter().all(|e| e.operation == Operation::Put));
    }

    #[tokio::test]
    async fn scan_of_empty_store_ends_immediately() {
        let store = MemoryMetadataStore::new(Arc::new(clock()));
        let events: Vec<MetadataEvent> = store.scan().await.unwrap().try_collect().await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn access_log_tracks_latest_touch() {
        let clock = clock();
        let log = MemoryAccessLog::new(Arc::new(clock.clone()));
        assert!(log.last_access("abc").await.unwrap_err().is_not_found());

        let t0 = clock.now();
        log.touch("abc").await.unwrap();
        assert_eq!(log.last_access("abc").await.unwrap(), t0);

        clock.advance(Duration::hours(1));
        log.touch("abc").await.unwrap();
        assert_eq!(log.last_access("abc").await.unwrap(), t0 + Duration::hours(1));

        log.delete("abc").await.unwrap();
        log.delete("abc").await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn invalid_keys_rejected() {
        let store = MemoryMetadataStore::new(Arc::new(clock()));
        let err = store.put("../etc", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
    }
}
