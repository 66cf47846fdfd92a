use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::blob::{decode_blob, read_header, BlobHeader};
use crate::error::PackResult;

/// A blob file on disk, memory-mapped for reading.
pub struct BlobFile {
    path: PathBuf,
    map: Mmap,
    header: BlobHeader,
}

impl BlobFile {
    /// Map `path` and read its header.
    pub fn open(path: &Path) -> PackResult<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only and blob files are written once via
        // `write_blob_file`, which renames a complete file into place.
        let map = unsafe { Mmap::map(&file)? };
        let header = read_header(&map)?;
        debug!(path = %path.display(), lix_id = %header.lix_id, size = map.len(), "opened blob file");
        Ok(Self {
            path: path.to_path_buf(),
            map,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &BlobHeader {
        &self.header
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Verify and decode the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> PackResult<T> {
        let (_, payload) = decode_blob(&self.map)?;
        Ok(payload)
    }
}

/// Write `blob` to `path` through a temporary sibling file.
pub fn write_blob_file(path: &Path, blob: &[u8]) -> PackResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(blob)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::encode_blob;
    use crate::error::PackError;
    use lix_types::LixId;
    use serde_json::{json, Value};

    #[test]
    fn disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.lix");
        let blob = encode_blob(&LixId::new("lix-disk"), &json!({"n": 1})).unwrap();
        write_blob_file(&path, &blob).unwrap();

        let file = BlobFile::open(&path).unwrap();
        assert_eq!(file.header().lix_id, LixId::new("lix-disk"));
        assert_eq!(file.as_bytes(), blob.as_slice());
        assert_eq!(file.decode::<Value>().unwrap(), json!({"n": 1}));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn non_blob_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.lix");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        assert!(matches!(BlobFile::open(&path), Err(PackError::InvalidMagic { .. })));
    }
}
