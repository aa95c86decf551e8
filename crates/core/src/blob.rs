//! Content-addressed archive blobs

use crate::error::{Error, IoContext, Result};
use crate::hash::{hash_reader, Blake3Hash};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Flat blob storage: `<root>/<hh>/<rest>` where `hhrest` is the hex hash
/// of the file's bytes.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a new blob store rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the filesystem path for a blob
    pub fn blob_path(&self, hash: &Blake3Hash) -> PathBuf {
        let hex = hash.to_hex();
        let (prefix, rest) = hex.split_at(2);
        self.root.join(prefix).join(rest)
    }

    /// Open a stored blob for reading
    pub fn open_blob(&self, hash: &Blake3Hash) -> Result<File> {
        let path = self.blob_path(hash);
        match File::open(&path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound(hash.to_key())),
            Err(e) => Err(Error::io(format!("opening blob {}", path.display()), e)),
        }
    }

    /// Move a finished temp file into the store under its content hash.
    ///
    /// The temp file must live on the same filesystem as the store so the
    /// final step is a rename. Inserting content that is already present is
    /// a no-op.
    pub fn insert(&self, mut tmp: NamedTempFile) -> Result<Blake3Hash> {
        let file = tmp.as_file_mut();
        file.sync_all().io_context(|| "syncing temp archive")?;
        file.seek(SeekFrom::Start(0)).io_context(|| "rewinding temp archive")?;
        let hash = hash_reader(BufReader::new(&*file)).io_context(|| "hashing temp archive")?;

        let path = self.blob_path(&hash);
        if path.is_file() {
            return Ok(hash);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).io_context(|| format!("creating {}", parent.display()))?;
        }
        tmp.persist(&path)
            .map_err(|e| Error::io(format!("moving blob into {}", path.display()), e.error))?;
        Ok(hash)
    }
}
