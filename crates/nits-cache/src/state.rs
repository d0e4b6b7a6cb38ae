//! # Handler State
//!
//! Shared state handed to every route handler through axum's `State`
//! extractor. Cloning is cheap: every field is reference counted.

use std::sync::Arc;

use nits_core::CacheInfo;
use nits_crypto::NarSigner;
use nits_store::Stores;

#[derive(Clone)]
pub struct CacheState {
    pub stores: Stores,
    pub signer: Arc<dyn NarSigner>,
    /// Pre-rendered `/nix-cache-info` body. Immutable for the process lifetime.
    pub cache_info: Arc<str>,
}

impl CacheState {
    pub fn new(stores: Stores, signer: Arc<dyn NarSigner>, info: &CacheInfo) -> Self {
        Self {
            stores,
            signer,
            cache_info: Arc::from(info.to_text()),
        }
    }
}

impl std::fmt::Debug for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheState")
            .field("signer", &self.signer.name())
            .finish_non_exhaustive()
    }
}
