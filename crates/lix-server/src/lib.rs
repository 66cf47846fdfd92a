//! HTTP host for lix whole-database sync.
//!
//! `POST /new` stores a raw database blob under the lix id in its header
//! and answers `201 {id}`, or `409` when that id is taken. `POST /get
//! {lix_id}` answers `200` with the blob, or `404`. Blobs live in memory or
//! under [`ServerConfig::storage_dir`].

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod storage;
pub mod transport;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::LixServer;
pub use storage::{BlobStore, DirBlobStore, MemoryBlobStore};
pub use transport::RouterTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use lix_protocol::{ErrorResponse, HealthResponse, NewResponse};
    use lix_sdk::{Lix, OpenOptions};
    use tower::util::ServiceExt;

    async fn app() -> axum::Router {
        LixServer::new(ServerConfig::default()).await.unwrap().router()
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app()
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(health.status, "ok");
    }

    #[tokio::test]
    async fn new_then_get() {
        let app = app().await;
        let lix = Lix::open(OpenOptions::new()).unwrap();
        let blob = lix.export().unwrap();

        let response = app.clone().oneshot(post("/new", blob.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: NewResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(&created.id, lix.lix_id());

        let response = app.clone().oneshot(post("/new", blob.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let request = serde_json::json!({ "lix_id": created.id }).to_string();
        let response = app.oneshot(post("/get", request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_bytes(response).await[..], &blob[..]);
    }

    #[tokio::test]
    async fn unknown_lix_is_not_found() {
        let response = app()
            .await
            .oneshot(post("/get", r#"{"lix_id":"nope"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error: ErrorResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(error.code, 404);
    }

    #[tokio::test]
    async fn malformed_requests_are_bad_requests() {
        let app = app().await;
        let response = app.clone().oneshot(post("/new", "not a blob")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post("/get", "{")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
