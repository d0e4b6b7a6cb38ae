//! # NAR Blob Endpoints
//!
//! Blobs are stored verbatim under `{hash}-{ext}` and streamed in both
//! directions. These endpoints do not touch the access log; clients always
//! fetch the narinfo before the blob, and that fetch keeps the artifact
//! fresh.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use nits_core::NarKey;
use tokio_util::io::{ReaderStream, StreamReader};

use super::CONTENT_TYPE_NAR;
use crate::error::CacheError;
use crate::state::CacheState;

/// `{hash}.nar.{ext}` → blob key. File names without `.nar.` are 404.
fn key_from_file(file: &str) -> Result<NarKey, CacheError> {
    if !file.contains(".nar.") {
        return Err(CacheError::NotFound(file.to_string()));
    }
    Ok(NarKey::from_file_name(file)?)
}

async fn open(state: &CacheState, file: &str, include_body: bool) -> Result<Response, CacheError> {
    let key = key_from_file(file)?;
    let blob = state.stores.blobs.get(&key.storage_key()).await?;

    let body = if include_body {
        Body::from_stream(ReaderStream::new(blob.reader))
    } else {
        Body::empty()
    };
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE_NAR.to_string()),
            (header::CONTENT_LENGTH, blob.size.to_string()),
        ],
        body,
    )
        .into_response())
}

pub async fn get_nar(
    State(state): State<CacheState>,
    Path(file): Path<String>,
) -> Result<Response, CacheError> {
    open(&state, &file, true).await
}

pub async fn head_nar(
    State(state): State<CacheState>,
    Path(file): Path<String>,
) -> Result<Response, CacheError> {
    open(&state, &file, false).await
}

pub async fn put_nar(
    State(state): State<CacheState>,
    Path(file): Path<String>,
    request: Request,
) -> Result<StatusCode, CacheError> {
    let key = key_from_file(&file)?;

    let stream = request
        .into_body()
        .into_data_stream()
        .map_err(std::io::Error::other);
    let reader = StreamReader::new(stream);

    let size = state
        .stores
        .blobs
        .put(&key.storage_key(), Box::new(reader))
        .await?;
    tracing::debug!(key = %key, size, "stored nar");
    Ok(StatusCode::NO_CONTENT)
}
