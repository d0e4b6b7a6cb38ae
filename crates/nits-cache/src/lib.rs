//! # nits-cache — Nix Binary Cache Service
//!
//! Serves the Nix binary-cache protocol over HTTP on top of the
//! `nits-store` stores, signs narinfos with the cache's key, and reclaims
//! artifacts nobody has fetched recently.
//!
//! ## API Surface
//!
//! | Path                     | Module               |
//! |--------------------------|----------------------|
//! | `/nix-cache-info`        | [`routes::cache_info`] |
//! | `/{hash}.narinfo`        | [`routes::narinfo`]  |
//! | `/nar/{hash}.nar.{ext}`  | [`routes::nar`]      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → RequestLog → CatchPanic → Timeout(60s) → Handler
//! ```
//!
//! ## Crate Policy
//!
//! - No cross-store transactions. Sign-then-persist and the garbage
//!   collector's delete sequence are explicit multi-step routines.
//! - Handlers never panic on bad input; every failure becomes a 4xx or 500.

pub mod config;
pub mod error;
pub mod gc;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;

use std::time::Duration;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;

pub use config::{Backend, CacheConfig, ConfigError};
pub use error::CacheError;
pub use gc::{GarbageCollector, GcError, GcReport, MissingAccessPolicy, GC_PARALLELISM};
pub use service::{CacheService, ServiceError};
pub use state::CacheState;

/// Upper bound on the time spent handling one request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Assemble the router with all routes and middleware.
pub fn app(state: CacheState) -> Router {
    routes::router()
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CatchPanicLayer::new())
        .layer(from_fn(middleware::request_log::request_log_middleware))
        .layer(middleware::tracing_layer::layer())
        .with_state(state)
}
