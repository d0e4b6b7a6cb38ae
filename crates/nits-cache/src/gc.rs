//! # Garbage Collector
//!
//! One sweep enumerates a snapshot of the metadata store, resolves each
//! narinfo to its blob key, and hands it to a worker that compares the
//! access-log timestamp with the cutoff. Entries last touched at or before
//! the cutoff lose their blob, access record, and narinfo, in that order.
//!
//! ## Concurrency
//!
//! At most [`GC_PARALLELISM`] workers run at once. A worker error cancels
//! further dispatch; workers already running finish, and the sweep never
//! returns while one is still in flight. Cancelling the caller's token stops
//! dispatch the same way.
//!
//! ## Consistency
//!
//! The three deletes are separate store operations. A crash or error between
//! them leaves an entry with its blob gone but its narinfo present; the next
//! sweep finds it again and finishes the job, since blob deletes are
//! idempotent. A narinfo re-signed by a concurrent GET can still be deleted
//! right after; the sweep is best-effort and does not lock keys.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use nits_core::NarInfo;
use nits_store::{Operation, StoreError, Stores};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Maximum number of entries evaluated concurrently.
pub const GC_PARALLELISM: usize = 4;

/// What to do with a narinfo that has no access record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingAccessPolicy {
    /// Keep it. Its history may predate access tracking.
    #[default]
    Skip,
    /// Treat it as unreferenced and remove it.
    Delete,
}

impl FromStr for MissingAccessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "delete" => Ok(Self::Delete),
            other => Err(format!("expected `skip` or `delete`, got {other:?}")),
        }
    }
}

impl fmt::Display for MissingAccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skip => "skip",
            Self::Delete => "delete",
        })
    }
}

#[derive(Error, Debug)]
pub enum GcError {
    #[error("metadata scan failed: {0}")]
    Scan(#[source] StoreError),

    #[error("reading access record for {key}: {source}")]
    AccessLookup { key: String, source: StoreError },

    #[error("deleting {collection}/{key}: {source}")]
    Delete {
        collection: &'static str,
        key: String,
        source: StoreError,
    },

    #[error("worker failed: {0}")]
    Worker(String),
}

/// Outcome of one sweep.
#[derive(Debug, Default, Serialize)]
pub struct GcReport {
    /// Narinfo entries seen by the scan.
    pub scanned: u64,
    /// Entries whose blob, access record, and narinfo were all deleted.
    pub removed: u64,
    /// Entries touched after the cutoff.
    pub skipped_hot: u64,
    /// Entries without an access record, kept under [`MissingAccessPolicy::Skip`].
    pub skipped_untracked: u64,
    /// Entries whose narinfo could not be parsed or resolved to a blob.
    pub skipped_invalid: u64,
    /// Whether the caller cancelled the sweep before the scan finished.
    pub cancelled: bool,
    /// First error encountered. Later errors are logged only.
    #[serde(serialize_with = "error_message")]
    pub error: Option<GcError>,
}

fn error_message<S: Serializer>(error: &Option<GcError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}

impl GcReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for GcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned {}, removed {}, hot {}, untracked {}, invalid {}",
            self.scanned, self.removed, self.skipped_hot, self.skipped_untracked, self.skipped_invalid
        )?;
        if self.cancelled {
            f.write_str(", cancelled")?;
        }
        if let Some(err) = &self.error {
            write!(f, ", error: {err}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Removed,
    Hot,
    Untracked,
}

/// Sweeps the stores of one cache.
#[derive(Debug, Clone)]
pub struct GarbageCollector {
    stores: Stores,
    policy: MissingAccessPolicy,
}

impl GarbageCollector {
    pub fn new(stores: Stores, policy: MissingAccessPolicy) -> Self {
        Self { stores, policy }
    }

    /// Run one sweep, removing every entry last accessed at or before `cutoff`.
    pub async fn collect(&self, cutoff: DateTime<Utc>, cancel: &CancellationToken) -> GcReport {
        let started = Instant::now();
        tracing::info!(%cutoff, policy = %self.policy, "garbage collection started");

        let dispatch = cancel.child_token();
        let mut report = GcReport::default();
        let mut workers: JoinSet<Result<Outcome, GcError>> = JoinSet::new();

        match self.stores.metadata.scan().await {
            Ok(mut scan) => loop {
                let next = tokio::select! {
                    biased;
                    _ = dispatch.cancelled() => break,
                    next = scan.next() => next,
                };
                let Some(event) = next else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        record_error(&mut report, GcError::Scan(err), &dispatch);
                        break;
                    }
                };
                if event.operation != Operation::Put {
                    continue;
                }
                report.scanned += 1;

                let blob_key = match NarInfo::parse(&event.value)
                    .map_err(|e| e.to_string())
                    .and_then(|info| info.nar_key().map_err(|e| e.to_string()))
                {
                    Ok(nar_key) => nar_key.storage_key(),
                    Err(reason) => {
                        tracing::warn!(key = %event.key, %reason, "skipping unreadable narinfo");
                        report.skipped_invalid += 1;
                        continue;
                    }
                };

                while workers.len() >= GC_PARALLELISM {
                    if let Some(joined) = workers.join_next().await {
                        record(&mut report, joined, &dispatch);
                    }
                }
                if dispatch.is_cancelled() {
                    break;
                }

                let stores = self.stores.clone();
                let policy = self.policy;
                workers.spawn(async move {
                    sweep_entry(&stores, event.key, blob_key, cutoff, policy).await
                });
            },
            Err(err) => record_error(&mut report, GcError::Scan(err), &dispatch),
        }

        while let Some(joined) = workers.join_next().await {
            record(&mut report, joined, &dispatch);
        }
        report.cancelled = cancel.is_cancelled();

        tracing::info!(
            elapsed = ?started.elapsed(),
            scanned = report.scanned,
            removed = report.removed,
            cancelled = report.cancelled,
            ok = report.is_success(),
            "garbage collection finished"
        );
        report
    }
}

fn record(
    report: &mut GcReport,
    joined: Result<Result<Outcome, GcError>, JoinError>,
    dispatch: &CancellationToken,
) {
    match joined {
        Ok(Ok(Outcome::Removed)) => report.removed += 1,
        Ok(Ok(Outcome::Hot)) => report.skipped_hot += 1,
        Ok(Ok(Outcome::Untracked)) => report.skipped_untracked += 1,
        Ok(Err(err)) => record_error(report, err, dispatch),
        Err(join) => record_error(report, GcError::Worker(join.to_string()), dispatch),
    }
}

fn record_error(report: &mut GcReport, err: GcError, dispatch: &CancellationToken) {
    tracing::error!(error = %err, "garbage collection error");
    dispatch.cancel();
    if report.error.is_none() {
        report.error = Some(err);
    }
}

async fn sweep_entry(
    stores: &Stores,
    key: String,
    blob_key: String,
    cutoff: DateTime<Utc>,
    policy: MissingAccessPolicy,
) -> Result<Outcome, GcError> {
    match stores.access.last_access(&key).await {
        Ok(last) if last > cutoff => return Ok(Outcome::Hot),
        Ok(last) => tracing::info!(%key, %last, "entry expired"),
        Err(err) if err.is_not_found() => match policy {
            MissingAccessPolicy::Skip => {
                tracing::debug!(%key, "no access record, keeping");
                return Ok(Outcome::Untracked);
            }
            MissingAccessPolicy::Delete => tracing::info!(%key, "no access record, removing"),
        },
        Err(source) => return Err(GcError::AccessLookup { key, source }),
    }

    stores
        .blobs
        .delete(&blob_key)
        .await
        .map_err(|source| GcError::Delete {
            collection: "nar",
            key: blob_key.clone(),
            source,
        })?;
    tracing::debug!(key = %blob_key, "deleted nar");

    stores
        .access
        .delete(&key)
        .await
        .map_err(|source| GcError::Delete {
            collection: "access",
            key: key.clone(),
            source,
        })?;
    tracing::debug!(%key, "deleted access record");

    stores
        .metadata
        .delete(&key)
        .await
        .map_err(|source| GcError::Delete {
            collection: "narinfo",
            key: key.clone(),
            source,
        })?;
    tracing::debug!(%key, "deleted narinfo");

    Ok(Outcome::Removed)
}
