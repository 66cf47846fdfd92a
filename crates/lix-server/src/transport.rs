use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use lix_protocol::{endpoints, ErrorResponse, GetRequest, NewResponse, ProtocolError, SyncCodec};
use lix_sync::{SyncError, SyncResult, SyncTransport};
use lix_types::LixId;
use tower::util::ServiceExt;

/// A [`SyncTransport`] that sends protocol requests straight to a router,
/// without a socket in between.
#[derive(Clone)]
pub struct RouterTransport {
    router: Router,
    max_blob_size: usize,
}

impl RouterTransport {
    pub fn new(router: Router, max_blob_size: usize) -> Self {
        Self {
            router,
            max_blob_size,
        }
    }

    async fn post(&self, uri: &str, content_type: &str, body: Bytes) -> SyncResult<(StatusCode, Bytes)> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        let status = response.status();
        let body = to_bytes(response.into_body(), self.max_blob_size)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        Ok((status, body))
    }
}

fn remote_error(status: StatusCode, body: &[u8]) -> SyncError {
    let message = SyncCodec::decode_json::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned());
    SyncError::Protocol(ProtocolError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SyncTransport for RouterTransport {
    async fn new_blob(&self, blob: Bytes) -> SyncResult<LixId> {
        let lix_id = SyncCodec::identify_blob(&blob, self.max_blob_size)?;
        let (status, body) = self
            .post(endpoints::NEW, "application/octet-stream", blob)
            .await?;
        match status {
            StatusCode::CREATED => Ok(SyncCodec::decode_json::<NewResponse>(&body)?.id),
            StatusCode::CONFLICT => Err(SyncError::AlreadyExists(lix_id)),
            other => Err(remote_error(other, &body)),
        }
    }

    async fn get_blob(&self, lix_id: &LixId) -> SyncResult<Option<Bytes>> {
        let request = SyncCodec::encode_json(&GetRequest {
            lix_id: lix_id.clone(),
        })?;
        let (status, body) = self.post(endpoints::GET, "application/json", request).await?;
        match status {
            StatusCode::OK => Ok(Some(body)),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(remote_error(other, &body)),
        }
    }
}
