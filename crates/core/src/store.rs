//! On-disk image store
//!
//! Archives are kept uncompressed under their BLAKE3 key. A small ref record
//! per archive maps the image's name and labels to that key.

use crate::archive;
use crate::blob::BlobStore;
use crate::config::StoreConfig;
use crate::error::{Error, IoContext, Result};
use crate::hash::Blake3Hash;
use crate::manifest::{labels_match, Dependency, Label, Manifest};
use dashmap::DashMap;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// What the dependency-tree engine needs from a store.
///
/// Keys are content hashes of uncompressed archives.
pub trait ImageStore {
    /// Map a name and labels to the key of the most recent matching archive.
    fn resolve(&self, name: &str, labels: &[Label]) -> Result<Blake3Hash>;

    /// Decoded manifest of the archive stored under `key`.
    fn get_manifest(&self, key: &Blake3Hash) -> Result<Manifest>;

    /// Raw archive bytes stored under `key`.
    fn read_stream(&self, key: &Blake3Hash) -> Result<Box<dyn Read>>;

    /// Store a finished archive (written to a file from [`ImageStore::tmp_file`])
    /// and return its content key.
    fn write_archive(&self, archive: NamedTempFile) -> Result<Blake3Hash>;

    /// Scratch file on the store's filesystem.
    fn tmp_file(&self) -> Result<NamedTempFile>;

    /// Key for a dependency: its image ID when pinned, otherwise whatever
    /// its name and labels resolve to.
    fn resolve_dependency(&self, dep: &Dependency) -> Result<Blake3Hash> {
        match dep.image_id {
            Some(id) => match self.get_manifest(&id) {
                Ok(_) => Ok(id),
                Err(Error::NotFound(_)) => Err(Error::resolution(
                    dep.image_name.clone(),
                    format!("image ID {} is not in the store", id),
                )),
                Err(e) => Err(e),
            },
            None => self.resolve(&dep.image_name, &dep.labels),
        }
    }
}

/// Name/labels record for one stored archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefRecord {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub key: Blake3Hash,
    /// Last time this archive was written, unix milliseconds
    pub imported_at_ms: u64,
}

/// Main image store
///
/// Manages the store directory structure:
/// ```text
/// <root>/
///   config.toml
///   blobs/
///     <hh>/<rest>     uncompressed image archives
///   refs/
///     <hex>.json      name + labels of each archive
///   tmp/              scratch files, renamed into blobs/
/// ```
pub struct Store {
    /// Store root directory
    root: PathBuf,
    /// Archive blobs
    blob_store: BlobStore,
    /// Loaded configuration
    config: StoreConfig,
    /// Manifest cache (key -> manifest)
    manifest_cache: DashMap<Blake3Hash, Arc<Manifest>>,
    /// Ref records by image name, loaded on open and kept current by writes
    ref_index: DashMap<String, Vec<RefRecord>>,
}

const REQUIRED_DIRS: [&str; 3] = ["blobs", "refs", "tmp"];

impl Store {
    /// Initialize a new store at the given directory
    pub fn init(root: &Path) -> Result<Self> {
        let config_path = root.join("config.toml");
        if config_path.exists() {
            return Err(Error::AlreadyExists(config_path));
        }
        for dir in REQUIRED_DIRS {
            let path = root.join(dir);
            fs::create_dir_all(&path).io_context(|| format!("creating {}", path.display()))?;
        }
        StoreConfig::default().save(&config_path)?;
        info!(root = %root.display(), "initialized image store");
        Self::open(root)
    }

    /// Open an existing store
    pub fn open(root: &Path) -> Result<Self> {
        for dir in REQUIRED_DIRS {
            if !root.join(dir).is_dir() {
                return Err(Error::Config(format!(
                    "{} is not an image store (missing {}/)",
                    root.display(),
                    dir
                )));
            }
        }
        let config = StoreConfig::load(&root.join("config.toml"))?;

        let store = Self {
            root: root.to_path_buf(),
            blob_store: BlobStore::new(root.join("blobs")),
            config,
            manifest_cache: DashMap::new(),
            ref_index: DashMap::new(),
        };
        for record in store.read_refs()? {
            store.ref_index.entry(record.name.clone()).or_default().push(record);
        }
        debug!(root = %root.display(), names = store.ref_index.len(), "opened image store");
        Ok(store)
    }

    /// Open the store, creating it first if the directory holds none
    pub fn open_or_init(root: &Path) -> Result<Self> {
        if root.join("config.toml").exists() {
            Self::open(root)
        } else {
            Self::init(root)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn refs_dir(&self) -> PathBuf {
        self.root.join("refs")
    }

    fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Every ref record on disk
    fn read_refs(&self) -> Result<Vec<RefRecord>> {
        let dir = self.refs_dir();
        let mut records = Vec::new();
        for entry in fs::read_dir(&dir).io_context(|| format!("listing {}", dir.display()))? {
            let path = entry.io_context(|| format!("listing {}", dir.display()))?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let bytes = fs::read(&path).io_context(|| format!("reading {}", path.display()))?;
            let record: RefRecord = serde_json::from_slice(&bytes)
                .map_err(|e| Error::decode(format!("ref {}", path.display()), e))?;
            records.push(record);
        }
        Ok(records)
    }

    fn write_ref(&self, manifest: &Manifest, key: Blake3Hash) -> Result<()> {
        let record = RefRecord {
            name: manifest.name.clone(),
            labels: manifest.labels.clone(),
            key,
            imported_at_ms: now_ms(),
        };
        let data = serde_json::to_vec_pretty(&record).map_err(|e| Error::decode("ref record", e))?;
        let target = self.refs_dir().join(format!("{}.json", key.to_hex()));
        atomic_write(&self.tmp_dir(), &target, &data)?;

        let mut records = self.ref_index.entry(record.name.clone()).or_default();
        records.retain(|r| r.key != key);
        records.push(record);
        Ok(())
    }

    /// Copy an archive file into the store, decompressing gzip input.
    ///
    /// Returns a dependency that pins the stored archive.
    pub fn import(&self, path: &Path) -> Result<Dependency> {
        let file = fs::File::open(path).io_context(|| format!("opening {}", path.display()))?;
        let key = self.import_reader(file)?;
        info!(path = %path.display(), key = %key, "imported image");
        self.dependency_for(&key)
    }

    /// Copy an archive stream into the store
    pub fn import_reader<R: Read>(&self, reader: R) -> Result<Blake3Hash> {
        let mut reader = archive::decompressed(reader)?;
        let mut tmp = self.tmp_file()?;
        io::copy(&mut reader, tmp.as_file_mut()).io_context(|| "copying archive into store")?;
        self.write_archive(tmp)
    }

    /// Write the archive under `key` to `out`, gzip compressed if configured.
    pub fn export(&self, key: &Blake3Hash, out: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && out.exists() {
            return Err(Error::AlreadyExists(out.to_path_buf()));
        }
        let parent = match out.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut blob = self.blob_store.open_blob(key)?;
        let mut tmp = NamedTempFile::new_in(&parent).io_context(|| format!("creating temp file in {}", parent.display()))?;

        if self.config.compress_exports {
            let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::new(self.config.compression_level));
            io::copy(&mut blob, &mut encoder).io_context(|| format!("compressing {}", key))?;
            encoder.finish().io_context(|| format!("compressing {}", key))?;
        } else {
            io::copy(&mut blob, tmp.as_file_mut()).io_context(|| format!("copying {}", key))?;
        }

        let persisted = if overwrite {
            tmp.persist(out).map(|_| ())
        } else {
            tmp.persist_noclobber(out).map(|_| ())
        };
        persisted.map_err(|e| Error::io(format!("writing {}", out.display()), e.error))?;
        debug!(key = %key, out = %out.display(), "exported image");
        Ok(())
    }

    /// Dependency naming the stored archive `key`
    pub fn dependency_for(&self, key: &Blake3Hash) -> Result<Dependency> {
        let manifest = self.get_manifest(key)?;
        Ok(Dependency::pinned(manifest.name, *key, manifest.labels))
    }
}

impl ImageStore for Store {
    fn resolve(&self, name: &str, labels: &[Label]) -> Result<Blake3Hash> {
        // Newest import wins; the key breaks same-millisecond ties.
        let best = self.ref_index.get(name).and_then(|records| {
            records
                .iter()
                .filter(|r| labels_match(&r.labels, labels))
                .max_by_key(|r| (r.imported_at_ms, r.key))
                .map(|r| r.key)
        });
        best.ok_or_else(|| {
            let reason = if labels.is_empty() {
                "no stored image has this name".to_string()
            } else {
                format!("no stored image matches labels {:?}", labels)
            };
            Error::resolution(name, reason)
        })
    }

    fn get_manifest(&self, key: &Blake3Hash) -> Result<Manifest> {
        if let Some(cached) = self.manifest_cache.get(key) {
            return Ok(Manifest::clone(&cached));
        }
        let blob = self.blob_store.open_blob(key)?;
        let manifest = archive::read_manifest(BufReader::new(blob)).map_err(|e| match e {
            Error::Decode { reason, .. } => Error::decode(format!("manifest of {}", key), reason),
            other => other,
        })?;
        self.manifest_cache.insert(*key, Arc::new(manifest.clone()));
        Ok(manifest)
    }

    fn read_stream(&self, key: &Blake3Hash) -> Result<Box<dyn Read>> {
        Ok(Box::new(BufReader::new(self.blob_store.open_blob(key)?)))
    }

    fn write_archive(&self, mut tmp: NamedTempFile) -> Result<Blake3Hash> {
        let file = tmp.as_file_mut();
        file.flush().io_context(|| "flushing temp archive")?;
        file.seek(SeekFrom::Start(0)).io_context(|| "rewinding temp archive")?;
        let manifest = archive::read_manifest(BufReader::new(&*file))?;

        let key = self.blob_store.insert(tmp)?;
        self.write_ref(&manifest, key)?;
        debug!(image = %manifest.name, key = %key, "stored archive");
        self.manifest_cache.insert(key, Arc::new(manifest));
        Ok(key)
    }

    fn tmp_file(&self) -> Result<NamedTempFile> {
        NamedTempFile::new_in(self.tmp_dir()).io_context(|| "creating temp file in store")
    }
}

/// Re-store the archive under `key` with `manifest` in place of its own.
///
/// Returns the key of the new archive. The old one stays in the store.
pub fn replace_manifest<S: ImageStore + ?Sized>(store: &S, key: &Blake3Hash, manifest: &Manifest) -> Result<Blake3Hash> {
    let mut tmp = store.tmp_file()?;
    let writer = archive::rewrite_manifest(
        store.read_stream(key)?,
        BufWriter::new(tmp.as_file_mut()),
        manifest,
    )?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .io_context(|| "flushing rewritten archive")?;
    store.write_archive(tmp)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Atomic write helper
///
/// Writes data to a temporary file in `tmp_dir`, fsyncs it, then renames it
/// to the target path.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(tmp_dir).io_context(|| format!("creating temp file in {}", tmp_dir.display()))?;
    tmp.write_all(data).io_context(|| format!("writing {}", target.display()))?;
    tmp.as_file().sync_all().io_context(|| format!("syncing {}", target.display()))?;
    tmp.persist(target)
        .map_err(|e| Error::io(format!("renaming into {}", target.display()), e.error))?;
    Ok(())
}
