/// HTTP endpoint paths of the sync protocol.
pub mod endpoints {
    /// `POST` a raw database blob to store it under its lix id.
    pub const NEW: &str = "/new";
    /// `POST` a [`GetRequest`](crate::GetRequest) to fetch a stored blob.
    pub const GET: &str = "/get";
    pub const HEALTH: &str = "/health";
}

/// Status codes the endpoints answer with.
pub mod status {
    pub const CREATED: u16 = 201;
    pub const OK: u16 = 200;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
}

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_defaults() {
        let h = HealthResponse::default();
        assert_eq!(h.status, "ok");
        assert_eq!(h.protocol_version, 1);
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(endpoints::NEW, "/new");
        assert_eq!(endpoints::GET, "/get");
    }
}
