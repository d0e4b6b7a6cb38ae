//! `GET /nix-cache-info`

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use super::CONTENT_TYPE_CACHE_INFO;
use crate::state::CacheState;

pub async fn get_cache_info(State(state): State<CacheState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, CONTENT_TYPE_CACHE_INFO)],
        state.cache_info.to_string(),
    )
}
