//! # Cache Service
//!
//! Composition root. Owns the configuration, the stores, and the listener,
//! and exposes the lifecycle the binary drives:
//!
//! ```text
//! new(config) → open() / init() → run(shutdown)
//!                        └──────→ garbage_collect(cancel, cutoff)
//! ```
//!
//! `open` connects the configured backend; `init` additionally binds the
//! listener. Nothing here is global: every handler and the collector receive
//! their dependencies from this struct.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use nits_crypto::NarSigner;
use nits_store::{Clock, StoreError, Stores, SystemClock};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{Backend, CacheConfig, ConfigError};
use crate::gc::{GarbageCollector, GcReport};
use crate::state::CacheState;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("opening stores: {0}")]
    Store(#[from] StoreError),

    #[error("binding {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("service not initialized: call {0} first")]
    NotInitialized(&'static str),
}

pub struct CacheService {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    stores: Option<Stores>,
    listener: Option<TcpListener>,
}

impl CacheService {
    /// Validate `config`. Stores are opened later by [`open`](Self::open).
    pub fn new(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            stores: None,
            listener: None,
        })
    }

    /// Use already-open stores instead of the configured backend.
    pub fn with_stores(config: CacheConfig, stores: Stores) -> Result<Self, ConfigError> {
        let mut service = Self::new(config)?;
        service.stores = Some(stores);
        Ok(service)
    }

    /// Replace the clock used by stores this service opens.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Connect the configured backend. No-op if stores are already present.
    pub async fn open(&mut self) -> Result<&Stores, ServiceError> {
        if self.stores.is_none() {
            let stores = match &self.config.backend {
                Backend::Memory => {
                    tracing::warn!("using in-memory stores; contents are lost on exit");
                    Stores::memory(Arc::clone(&self.clock))
                }
                Backend::Filesystem(root) => {
                    Stores::filesystem(root, &self.config.collections, Arc::clone(&self.clock))
                        .await?
                }
            };
            self.stores = Some(stores);
        }
        self.stores.as_ref().ok_or(ServiceError::NotInitialized("open"))
    }

    /// Open the stores and bind the listener.
    pub async fn init(&mut self) -> Result<(), ServiceError> {
        tracing::info!(config = ?self.config, "init");
        self.open().await?;
        let listener = TcpListener::bind(&self.config.bind_address)
            .await
            .map_err(|source| ServiceError::Bind {
                address: self.config.bind_address.clone(),
                source,
            })?;
        tracing::info!(address = ?listener.local_addr().ok(), "init complete");
        self.listener = Some(listener);
        Ok(())
    }

    /// Address the listener is bound to, once [`init`](Self::init) has run.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }

    /// The fully layered router over this service's stores.
    pub fn router(&self) -> Result<Router, ServiceError> {
        let stores = self
            .stores
            .clone()
            .ok_or(ServiceError::NotInitialized("open"))?;
        let signer: Arc<dyn NarSigner> = self.config.signing_key.clone();
        Ok(crate::app(CacheState::new(stores, signer, &self.config.info)))
    }

    /// Serve until `shutdown` is cancelled, then finish in-flight requests.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        let listener = self
            .listener
            .take()
            .ok_or(ServiceError::NotInitialized("init"))?;
        let router = self.router()?;
        tracing::info!(address = ?listener.local_addr().ok(), "serving");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ServiceError::Serve)?;

        tracing::info!("server stopped");
        Ok(())
    }

    /// Run one garbage-collection sweep with the configured missing-access policy.
    pub async fn garbage_collect(
        &self,
        cancel: &CancellationToken,
        cutoff: DateTime<Utc>,
    ) -> Result<GcReport, ServiceError> {
        let stores = self
            .stores
            .clone()
            .ok_or(ServiceError::NotInitialized("open"))?;
        let collector = GarbageCollector::new(stores, self.config.missing_access);
        Ok(collector.collect(cutoff, cancel).await)
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("config", &self.config)
            .field("opened", &self.stores.is_some())
            .field("listening", &self.local_addr())
            .finish()
    }
}
