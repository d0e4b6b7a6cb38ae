//! # Narinfo Endpoints
//!
//! Every successful read or write touches the access log for the hash; that
//! touch is what keeps an artifact alive through garbage collection.
//!
//! PUT rejects a record whose `URL` does not resolve to a blob key.
//!
//! GET signs a record that lacks this cache's signature and persists the
//! signed version before responding. HEAD never signs. If signing fails the
//! request is a 500 and nothing is written.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use nits_core::{NarInfo, StoreHash};
use nits_crypto::sign_if_needed;

use super::CONTENT_TYPE_NARINFO;
use crate::error::CacheError;
use crate::state::CacheState;

/// `{hash}.narinfo` → validated hash. Other suffixes are 404.
fn hash_from_file(file: &str) -> Result<StoreHash, CacheError> {
    let hash = file
        .strip_suffix(".narinfo")
        .ok_or_else(|| CacheError::NotFound(file.to_string()))?;
    Ok(StoreHash::new(hash)?)
}

fn narinfo_response(body: Bytes, include_body: bool) -> Response {
    let len = body.len();
    let body = if include_body { Body::from(body) } else { Body::empty() };
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE_NARINFO.to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        body,
    )
        .into_response()
}

pub async fn get_narinfo(
    State(state): State<CacheState>,
    Path(file): Path<String>,
) -> Result<Response, CacheError> {
    let hash = hash_from_file(&file)?;
    let key = hash.as_str();

    let entry = state.stores.metadata.get(key).await?;
    state.stores.access.touch(key).await?;

    let mut info = NarInfo::parse(&entry.value).map_err(|e| CacheError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    if !sign_if_needed(state.signer.as_ref(), &mut info)? {
        return Ok(narinfo_response(entry.value, true));
    }

    let signed = Bytes::from(info.to_bytes());
    state.stores.metadata.put(key, signed.clone()).await?;
    tracing::info!(hash = %hash, signer = state.signer.name(), "signed narinfo on read");
    Ok(narinfo_response(signed, true))
}

pub async fn head_narinfo(
    State(state): State<CacheState>,
    Path(file): Path<String>,
) -> Result<Response, CacheError> {
    let hash = hash_from_file(&file)?;
    let entry = state.stores.metadata.get(hash.as_str()).await?;
    state.stores.access.touch(hash.as_str()).await?;
    Ok(narinfo_response(entry.value, false))
}

pub async fn put_narinfo(
    State(state): State<CacheState>,
    Path(file): Path<String>,
    body: Bytes,
) -> Result<StatusCode, CacheError> {
    let hash = hash_from_file(&file)?;
    let key = hash.as_str();

    let mut info = NarInfo::parse(&body)?;
    // A record whose URL names no blob could never be collected.
    info.nar_key()?;
    let signed = sign_if_needed(state.signer.as_ref(), &mut info)?;

    state.stores.metadata.put(key, Bytes::from(info.to_bytes())).await?;
    state.stores.access.touch(key).await?;

    tracing::debug!(hash = %hash, store_path = info.store_path(), signed, "stored narinfo");
    Ok(StatusCode::NO_CONTENT)
}
