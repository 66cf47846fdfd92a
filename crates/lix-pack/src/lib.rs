//! Database blob format for lix.
//!
//! A whole database travels as one blob: a small uncompressed header naming
//! the database, a zstd-compressed JSON payload with a CRC32, and a BLAKE3
//! trailer over everything before it. Blob files on disk are read through a
//! memory map.

pub mod blob;
pub mod error;
pub mod file;
mod varint;

pub use blob::{decode_blob, encode_blob, read_header, verify_blob, BlobHeader, FORMAT_VERSION, MAGIC};
pub use error::{PackError, PackResult};
pub use file::{write_blob_file, BlobFile};
