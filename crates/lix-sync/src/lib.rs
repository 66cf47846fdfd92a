//! Hosting boundary and whole-database sync for lix.
//!
//! An [`Environment`] decides where the engine runs: on the caller's task
//! ([`InProcessEnvironment`]) or on a spawned actor ([`ActorEnvironment`]).
//! Both serve [`Call`]s in the order a caller makes them.
//!
//! [`SyncClient`] moves entire databases between an environment and a
//! [`SyncTransport`]: push uploads the exported blob, pull downloads one and
//! either opens it or merges it into the open database.

pub mod actor;
pub mod call;
pub mod client;
pub mod environment;
pub mod error;
pub mod host;
pub mod transport;

pub use actor::ActorEnvironment;
pub use call::{from_reply, Call};
pub use client::{PullOutcome, PushOutcome, SyncClient};
pub use environment::{Environment, InProcessEnvironment};
pub use error::{EnvironmentError, EnvironmentResult, SyncError, SyncResult};
pub use host::HostConfig;
pub use transport::{MemoryTransport, SyncTransport};
