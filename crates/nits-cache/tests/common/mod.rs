//! Shared helpers for the nits-cache integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use nits_cache::CacheState;
use nits_core::{CacheInfo, NarSignature};
use nits_crypto::{CryptoError, NarSigner, SigningIdentity};
use nits_store::{
    AccessLog, BlobObject, BlobReader, BlobStore, ManualClock, MetadataEntry, MetadataScan,
    MetadataStore, StoreError, Stores,
};
use tower::ServiceExt;

pub const CACHE_NAME: &str = "cache.test.org-1";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub fn identity() -> SigningIdentity {
    SigningIdentity::from_seed(CACHE_NAME, &[42u8; 32]).unwrap()
}

/// An unsigned narinfo describing `nar/{hash}.nar.{ext}`.
pub fn narinfo(hash: &str, ext: &str) -> String {
    format!(
        "StorePath: /nix/store/{hash}-hello-2.12\n\
         URL: nar/{hash}.nar.{ext}\n\
         Compression: {ext}\n\
         FileHash: sha256:0jr2xvbp7cbxzq25bkw2x8m8nqgdwqjc1xm3a2ngcndyyx4dnbza\n\
         FileSize: 50088\n\
         NarHash: sha256:1b8m03r63zqhnjf7l5wnldhh7c134ap5vpj0850ymkq1iyzicy5s\n\
         NarSize: 226552\n\
         References: {hash}-hello-2.12\n\
         Deriver: 3x6b3bhsqqpajwvq9ycmmqpvmvmz3xcv-hello-2.12.drv\n"
    )
}

/// Total number of store operations observed.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

struct CountingBlobs(Arc<dyn BlobStore>, CallCounter);
struct CountingMetadata(Arc<dyn MetadataStore>, CallCounter);
struct CountingAccess(Arc<dyn AccessLog>, CallCounter);

#[async_trait]
impl BlobStore for CountingBlobs {
    async fn put(&self, key: &str, reader: BlobReader) -> Result<u64, StoreError> {
        self.1.hit();
        self.0.put(key, reader).await
    }
    async fn get(&self, key: &str) -> Result<BlobObject, StoreError> {
        self.1.hit();
        self.0.get(key).await
    }
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.1.hit();
        self.0.delete(key).await
    }
}

#[async_trait]
impl MetadataStore for CountingMetadata {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.1.hit();
        self.0.put(key, value).await
    }
    async fn get(&self, key: &str) -> Result<MetadataEntry, StoreError> {
        self.1.hit();
        self.0.get(key).await
    }
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.1.hit();
        self.0.delete(key).await
    }
    async fn scan(&self) -> Result<MetadataScan, StoreError> {
        self.1.hit();
        self.0.scan().await
    }
}

#[async_trait]
impl AccessLog for CountingAccess {
    async fn touch(&self, key: &str) -> Result<(), StoreError> {
        self.1.hit();
        self.0.touch(key).await
    }
    async fn last_access(&self, key: &str) -> Result<DateTime<Utc>, StoreError> {
        self.1.hit();
        self.0.last_access(key).await
    }
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.1.hit();
        self.0.delete(key).await
    }
}

/// Wrap every store so each call increments `counter`.
pub fn counting(stores: Stores, counter: CallCounter) -> Stores {
    Stores {
        blobs: Arc::new(CountingBlobs(stores.blobs, counter.clone())),
        metadata: Arc::new(CountingMetadata(stores.metadata, counter.clone())),
        access: Arc::new(CountingAccess(stores.access, counter)),
    }
}

/// A signer whose key is unusable.
pub struct BrokenSigner;

impl NarSigner for BrokenSigner {
    fn name(&self) -> &str {
        "broken-1"
    }

    fn sign(&self, _fingerprint: &[u8]) -> Result<NarSignature, CryptoError> {
        Err(CryptoError::Signing("key unavailable".into()))
    }
}

pub struct Harness {
    pub app: Router,
    pub stores: Stores,
    pub clock: ManualClock,
    pub calls: CallCounter,
}

pub fn harness() -> Harness {
    harness_with_signer(Arc::new(identity()))
}

pub fn harness_with_signer(signer: Arc<dyn NarSigner>) -> Harness {
    let clock = ManualClock::new(t0());
    let stores = Stores::memory(Arc::new(clock.clone()));
    let calls = CallCounter::default();
    let state = CacheState::new(
        counting(stores.clone(), calls.clone()),
        signer,
        &CacheInfo::default(),
    );
    Harness {
        app: nits_cache::app(state),
        stores,
        clock,
        calls,
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: impl Into<Body>) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}
