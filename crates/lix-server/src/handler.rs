use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use lix_protocol::{GetRequest, HealthResponse, NewResponse, SyncCodec};
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::storage::BlobStore;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub max_blob_size: usize,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// `POST /new`: store a raw database blob under the lix id in its header.
pub async fn new_handler(State(state): State<AppState>, body: Bytes) -> ServerResult<Response> {
    let lix_id = SyncCodec::identify_blob(&body, state.max_blob_size)?;
    let size = body.len();
    if !state.store.insert(&lix_id, body).await? {
        return Err(ServerError::AlreadyExists(lix_id));
    }
    info!(lix_id = %lix_id, bytes = size, "stored lix");
    Ok((StatusCode::CREATED, Json(NewResponse { id: lix_id })).into_response())
}

/// `POST /get {lix_id}`: answer with the stored blob.
pub async fn get_handler(State(state): State<AppState>, body: Bytes) -> ServerResult<Response> {
    let request: GetRequest = SyncCodec::decode_json(&body)?;
    let blob = state
        .store
        .get(&request.lix_id)
        .await?
        .ok_or(ServerError::NotFound(request.lix_id))?;
    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
        blob,
    )
        .into_response())
}
