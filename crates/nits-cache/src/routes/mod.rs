//! # Binary Cache Routes
//!
//! | Method          | Path                           | Module          |
//! |-----------------|--------------------------------|-----------------|
//! | GET             | `/nix-cache-info`              | [`cache_info`]  |
//! | GET, HEAD, PUT  | `/{hash}.narinfo`              | [`narinfo`]     |
//! | GET, HEAD, PUT  | `/nar/{hash}.nar.{ext}`        | [`nar`]         |
//!
//! Path suffixes are parsed inside the handlers; a path of the right shape
//! with an invalid hash or compression is a 400 and never reaches a store.
//! Anything else falls through to 404.

pub mod cache_info;
pub mod nar;
pub mod narinfo;

use axum::routing::get;
use axum::Router;

use crate::state::CacheState;

pub const CONTENT_TYPE_CACHE_INFO: &str = "text/x-nix-cache-info";
pub const CONTENT_TYPE_NARINFO: &str = "text/x-nix-narinfo";
pub const CONTENT_TYPE_NAR: &str = "application/x-nix-nar";

pub fn router() -> Router<CacheState> {
    Router::new()
        .route("/nix-cache-info", get(cache_info::get_cache_info))
        .route(
            "/{file}",
            get(narinfo::get_narinfo)
                .head(narinfo::head_narinfo)
                .put(narinfo::put_narinfo),
        )
        .route(
            "/nar/{file}",
            get(nar::get_nar).head(nar::head_nar).put(nar::put_nar),
        )
}
