//! Wire contract for lix whole-database sync.
//!
//! Sync exchanges entire databases, never incremental diffs. A client
//! uploads a blob with `POST /new` (answered `201 {id}`, or `409` when that
//! lix id is already stored) and downloads one with `POST /get {lix_id}`
//! (answered `200` with the raw blob, or `404`).

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;

pub use codec::SyncCodec;
pub use endpoint::{endpoints, status, HealthResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{ErrorResponse, GetRequest, NewResponse, MAX_BLOB_SIZE, PROTOCOL_VERSION};
