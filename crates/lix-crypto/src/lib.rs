//! Content hashing for lix.
//!
//! Snapshots are addressed by the BLAKE3 hash of their canonical JSON form.
//! Canonicalisation sorts object keys and normalises numbers so that two
//! structurally equal values always hash to the same [`SnapshotId`].
//!
//! [`SnapshotId`]: lix_types::SnapshotId

pub mod canonical;
pub mod hasher;

pub use canonical::{canonical_bytes, canonicalize};
pub use hasher::{ContentHasher, HasherError};
