//! Snapshot and change storage.
//!
//! Every entity value lives in a content-addressed [`Snapshot`]. Every
//! mutation is an immutable [`Change`] pointing at a snapshot (or at the
//! no-content tombstone for deletions).
//!
//! # Storage
//!
//! - [`SnapshotStore`] is the snapshot backend trait; [`InMemorySnapshotStore`]
//!   keeps snapshots in a `HashMap` behind a `RwLock`.
//! - [`ChangeLog`] is the append-only change log with per-entity indexes.
//!
//! # Rules
//!
//! 1. Snapshots are immutable and deduplicated by content hash.
//! 2. Changes are only ever appended. There is no update or delete.
//! 3. Content is validated against its schema before anything is written.

pub mod change;
pub mod error;
pub mod log;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use change::{Change, NewChange};
pub use error::{StoreError, StoreResult};
pub use log::ChangeLog;
pub use memory::InMemorySnapshotStore;
pub use snapshot::Snapshot;
pub use traits::SnapshotStore;
