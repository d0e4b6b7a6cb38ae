//! # Garbage Collection Tests
//!
//! Timestamps come from a `ManualClock`, so "touched at t0 + 2h" is exact.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, StatusCode};
use bytes::Bytes;
use chrono::Duration;
use common::*;
use nits_cache::{GarbageCollector, GcError, MissingAccessPolicy, GC_PARALLELISM};
use nits_store::{BlobObject, BlobReader, BlobStore, ManualClock, StoreError, Stores};
use tokio_util::sync::CancellationToken;

/// Seed blob, narinfo, and access record for `hash` at the clock's current time.
async fn seed(stores: &Stores, hash: &str) {
    stores
        .blobs
        .put(&format!("{hash}-xz"), Box::new(std::io::Cursor::new(b"nar".to_vec())))
        .await
        .unwrap();
    stores
        .metadata
        .put(hash, Bytes::from(narinfo(hash, "xz")))
        .await
        .unwrap();
    stores.access.touch(hash).await.unwrap();
}

async fn assert_present(stores: &Stores, hash: &str) {
    assert!(stores.blobs.get(&format!("{hash}-xz")).await.is_ok(), "{hash} blob");
    assert!(stores.metadata.get(hash).await.is_ok(), "{hash} narinfo");
    assert!(stores.access.last_access(hash).await.is_ok(), "{hash} access");
}

async fn assert_gone(stores: &Stores, hash: &str) {
    assert!(stores.blobs.get(&format!("{hash}-xz")).await.unwrap_err().is_not_found());
    assert!(stores.metadata.get(hash).await.unwrap_err().is_not_found());
    assert!(stores.access.last_access(hash).await.unwrap_err().is_not_found());
}

fn memory_stores() -> (Stores, ManualClock) {
    let clock = ManualClock::new(t0());
    (Stores::memory(Arc::new(clock.clone())), clock)
}

#[tokio::test]
async fn cutoff_separates_cold_from_hot() {
    let (stores, clock) = memory_stores();
    seed(&stores, "xyz").await;
    clock.set(t0() + Duration::hours(2));
    seed(&stores, "xyz2").await;

    let gc = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip);
    let report = gc
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;

    assert!(report.is_success(), "{report}");
    assert_eq!(report.scanned, 2);
    assert_eq!(report.removed, 1);
    assert_eq!(report.skipped_hot, 1);
    assert!(!report.cancelled);
    assert_gone(&stores, "xyz").await;
    assert_present(&stores, "xyz2").await;
}

#[tokio::test]
async fn entry_touched_exactly_at_cutoff_is_removed() {
    let (stores, _clock) = memory_stores();
    seed(&stores, "edge").await;

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip)
        .collect(t0(), &CancellationToken::new())
        .await;
    assert_eq!(report.removed, 1);
    assert_gone(&stores, "edge").await;
}

#[tokio::test]
async fn reads_through_the_protocol_keep_entries_alive() {
    let h = harness();
    h.stores
        .blobs
        .put("abc123-xz", Box::new(std::io::Cursor::new(b"nar".to_vec())))
        .await
        .unwrap();
    let put = send(&h.app, Method::PUT, "/abc123.narinfo", narinfo("abc123", "xz")).await;
    assert_eq!(put.status(), StatusCode::NO_CONTENT);

    h.clock.advance(Duration::days(30));
    let get = send(&h.app, Method::GET, "/abc123.narinfo", Body::empty()).await;
    assert_eq!(get.status(), StatusCode::OK);

    let cutoff = t0() + Duration::days(1);
    let report = GarbageCollector::new(h.stores.clone(), MissingAccessPolicy::Skip)
        .collect(cutoff, &CancellationToken::new())
        .await;
    assert_eq!(report.removed, 0);
    assert_eq!(report.skipped_hot, 1);
    assert!(h.stores.blobs.get("abc123-xz").await.is_ok());
}

#[tokio::test]
async fn missing_access_record_skipped_by_default() {
    let (stores, _clock) = memory_stores();
    seed(&stores, "untracked").await;
    stores.access.delete("untracked").await.unwrap();

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip)
        .collect(t0() + Duration::days(365), &CancellationToken::new())
        .await;
    assert_eq!(report.removed, 0);
    assert_eq!(report.skipped_untracked, 1);
    assert!(stores.metadata.get("untracked").await.is_ok());
    assert!(stores.blobs.get("untracked-xz").await.is_ok());
}

#[tokio::test]
async fn missing_access_record_deleted_when_configured() {
    let (stores, _clock) = memory_stores();
    seed(&stores, "untracked").await;
    stores.access.delete("untracked").await.unwrap();

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Delete)
        .collect(t0() + Duration::days(365), &CancellationToken::new())
        .await;
    assert_eq!(report.removed, 1);
    assert_gone(&stores, "untracked").await;
}

#[tokio::test]
async fn already_missing_blob_still_cleans_up() {
    let (stores, _clock) = memory_stores();
    seed(&stores, "halfgone").await;
    stores.blobs.delete("halfgone-xz").await.unwrap();

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;
    assert!(report.is_success());
    assert_eq!(report.removed, 1);
    assert_gone(&stores, "halfgone").await;
}

#[tokio::test]
async fn unreadable_narinfo_skipped_not_fatal() {
    let (stores, _clock) = memory_stores();
    seed(&stores, "good").await;
    stores
        .metadata
        .put("broken", Bytes::from_static(b"not a narinfo"))
        .await
        .unwrap();
    stores
        .metadata
        .put("badurl", Bytes::from(narinfo("badurl", "xz").replace("URL: nar/", "URL: elsewhere/")))
        .await
        .unwrap();

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;
    assert!(report.is_success());
    assert_eq!(report.scanned, 3);
    assert_eq!(report.skipped_invalid, 2);
    assert_eq!(report.removed, 1);
    assert!(stores.metadata.get("broken").await.is_ok());
}

#[tokio::test]
async fn empty_store_sweeps_cleanly() {
    let (stores, _clock) = memory_stores();
    let report = GarbageCollector::new(stores, MissingAccessPolicy::Skip)
        .collect(t0(), &CancellationToken::new())
        .await;
    assert!(report.is_success());
    assert_eq!(report.scanned, 0);
}

#[tokio::test]
async fn cancelled_before_start_removes_nothing() {
    let (stores, _clock) = memory_stores();
    for i in 0..10 {
        seed(&stores, &format!("old{i}")).await;
    }
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &cancel)
        .await;
    assert!(report.cancelled);
    assert_eq!(report.removed, 0);
    for i in 0..10 {
        assert_present(&stores, &format!("old{i}")).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailDeletes {
    Never,
    All,
    /// The first delete fails at once; the rest succeed after the delay.
    First,
}

/// Blob store that records delete attempts and peak concurrency.
struct InstrumentedBlobs {
    inner: Arc<dyn BlobStore>,
    delay: std::time::Duration,
    fail: FailDeletes,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl BlobStore for InstrumentedBlobs {
    async fn put(&self, key: &str, reader: BlobReader) -> Result<u64, StoreError> {
        self.inner.put(key, reader).await
    }

    async fn get(&self, key: &str) -> Result<BlobObject, StoreError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail == FailDeletes::First && attempt == 0 {
            return Err(StoreError::Backend("disk on fire".into()));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.fail == FailDeletes::All {
            return Err(StoreError::Backend("disk on fire".into()));
        }
        self.inner.delete(key).await
    }
}

fn instrumented(
    stores: &Stores,
    fail: FailDeletes,
    delay_ms: u64,
) -> (Stores, Arc<InstrumentedBlobs>) {
    let blobs = Arc::new(InstrumentedBlobs {
        inner: stores.blobs.clone(),
        delay: std::time::Duration::from_millis(delay_ms),
        fail,
        attempts: AtomicUsize::new(0),
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let wrapped = Stores {
        blobs: blobs.clone(),
        metadata: stores.metadata.clone(),
        access: stores.access.clone(),
    };
    (wrapped, blobs)
}

/// Every entry is either intact or fully removed; returns how many are removed.
async fn count_removed(stores: &Stores, hashes: &[String]) -> u64 {
    let mut removed = 0;
    for hash in hashes {
        let blob = stores.blobs.get(&format!("{hash}-xz")).await.is_ok();
        let info = stores.metadata.get(hash).await.is_ok();
        let access = stores.access.last_access(hash).await.is_ok();
        assert!(blob == info && info == access, "{hash} half deleted");
        if !blob {
            removed += 1;
        }
    }
    removed
}

async fn seed_many(stores: &Stores, n: usize) -> Vec<String> {
    let mut hashes = Vec::with_capacity(n);
    for i in 0..n {
        let hash = format!("old{i}");
        seed(stores, &hash).await;
        hashes.push(hash);
    }
    hashes
}

#[tokio::test]
async fn parallelism_is_bounded() {
    let (stores, _clock) = memory_stores();
    for i in 0..20 {
        seed(&stores, &format!("old{i}")).await;
    }
    let (wrapped, blobs) = instrumented(&stores, FailDeletes::Never, 5);

    let report = GarbageCollector::new(wrapped, MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;
    assert!(report.is_success());
    assert_eq!(report.removed, 20);
    let peak = blobs.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= GC_PARALLELISM, "peak {peak}");
    assert_eq!(blobs.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_failure_reported_and_nothing_counted() {
    let (stores, _clock) = memory_stores();
    for i in 0..8 {
        seed(&stores, &format!("old{i}")).await;
    }
    let (wrapped, blobs) = instrumented(&stores, FailDeletes::All, 5);

    let report = GarbageCollector::new(wrapped, MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;

    assert!(matches!(
        report.error,
        Some(GcError::Delete { collection: "nar", .. })
    ));
    assert_eq!(report.removed, 0);
    assert_eq!(blobs.in_flight.load(Ordering::SeqCst), 0);
    // The blob delete is first, so every narinfo and access record survives.
    for i in 0..8 {
        assert_present(&stores, &format!("old{i}")).await;
    }
}

#[tokio::test]
async fn cancel_mid_sweep_drains_workers() {
    let (stores, _clock) = memory_stores();
    let hashes = seed_many(&stores, 20).await;
    let (wrapped, blobs) = instrumented(&stores, FailDeletes::Never, 50);
    let gc = GarbageCollector::new(wrapped, MissingAccessPolicy::Skip);
    let cancel = CancellationToken::new();

    let (report, ()) = tokio::join!(gc.collect(t0() + Duration::hours(1), &cancel), async {
        while blobs.attempts.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        cancel.cancel();
    });

    assert_eq!(blobs.in_flight.load(Ordering::SeqCst), 0);
    assert!(report.cancelled, "{report}");
    assert!(report.is_success(), "{report}");
    assert!(report.removed >= 1, "{report}");
    assert!(report.removed < 20, "{report}");
    assert_eq!(count_removed(&stores, &hashes).await, report.removed);
}

#[tokio::test]
async fn first_delete_failure_stops_dispatch() {
    let (stores, _clock) = memory_stores();
    let hashes = seed_many(&stores, 20).await;
    let (wrapped, blobs) = instrumented(&stores, FailDeletes::First, 20);

    let report = GarbageCollector::new(wrapped, MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;

    assert!(matches!(
        report.error,
        Some(GcError::Delete { collection: "nar", .. })
    ));
    assert!(!report.cancelled);
    assert!(report.scanned < 20, "{report}");
    assert!(blobs.attempts.load(Ordering::SeqCst) < 20);
    assert!(report.removed as usize <= GC_PARALLELISM, "{report}");
    assert_eq!(blobs.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(count_removed(&stores, &hashes).await, report.removed);
}

#[tokio::test]
async fn filesystem_backend_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(t0());
    let stores = Stores::filesystem(
        dir.path(),
        &nits_store::Collections::default(),
        Arc::new(clock.clone()),
    )
    .await
    .unwrap();

    seed(&stores, "xyz").await;
    clock.set(t0() + Duration::hours(2));
    seed(&stores, "xyz2").await;

    let report = GarbageCollector::new(stores.clone(), MissingAccessPolicy::Skip)
        .collect(t0() + Duration::hours(1), &CancellationToken::new())
        .await;
    assert!(report.is_success(), "{report}");
    assert_eq!(report.removed, 1);
    assert_gone(&stores, "xyz").await;
    assert_present(&stores, "xyz2").await;
    assert!(!dir.path().join("nar/xyz-xz").exists());
    assert!(!dir.path().join("nar-info/xyz").exists());
    assert!(!dir.path().join("nar-info-access/xyz").exists());
}
