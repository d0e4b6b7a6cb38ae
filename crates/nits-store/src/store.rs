//! # Store Contracts
//!
//! Object-safe traits implemented by every backend. Callers hold them as
//! `Arc<dyn ...>` inside [`Stores`](crate::Stores).
//!
//! Deletes are idempotent across all three stores: deleting an absent key
//! succeeds. The garbage collector relies on this when a blob has already
//! been removed by an earlier, partially failed sweep.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use crate::error::StoreError;

/// Streaming blob body.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// A blob opened for reading.
pub struct BlobObject {
    /// Size in bytes as recorded when the blob was written.
    pub size: u64,
    pub reader: BlobReader,
}

impl std::fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobObject")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the full contents of `reader` under `key`, replacing any
    /// previous value. Returns the number of bytes written.
    async fn put(&self, key: &str, reader: BlobReader) -> Result<u64, StoreError>;

    /// Open `key` for streaming. `NotFound` if absent.
    async fn get(&self, key: &str) -> Result<BlobObject, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// A metadata value together with the time it was last written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub value: Bytes,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Put,
    /// The key vanished between listing and reading.
    Delete,
}

/// One entry of a metadata scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEvent {
    pub key: String,
    /// Empty for [`Operation::Delete`].
    pub value: Bytes,
    pub operation: Operation,
}

/// Finite stream over a snapshot of the metadata collection. Ends once every
/// entry present when the scan began has been yielded.
pub type MetadataScan = BoxStream<'static, Result<MetadataEvent, StoreError>>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// `NotFound` if absent.
    async fn get(&self, key: &str) -> Result<MetadataEntry, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Enumerate all current entries once.
    async fn scan(&self) -> Result<MetadataScan, StoreError>;
}

#[async_trait]
pub trait AccessLog: Send + Sync {
    /// Record that `key` was accessed now.
    async fn touch(&self, key: &str) -> Result<(), StoreError>;

    /// Time of the most recent touch. `NotFound` if never touched.
    async fn last_access(&self, key: &str) -> Result<DateTime<Utc>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
