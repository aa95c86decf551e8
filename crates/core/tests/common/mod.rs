//! Fixtures shared by the core integration tests

#![allow(dead_code)]

use acb_core::archive::{self, MANIFEST_FILE, ROOTFS_DIR};
use acb_core::{Blake3Hash, Dependency, ImageStore, Manifest, Store};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fresh store in its own temp dir
pub fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let store = Store::init(dir.path()).expect("init store");
    (dir, store)
}

/// Build an image from a name, its dependencies and rootfs files, store it,
/// and return the dependency pinning it.
pub fn put_image(store: &Store, name: &str, deps: Vec<Dependency>, files: &[(&str, &[u8])]) -> Dependency {
    let dir = tempfile::tempdir().expect("create image dir");
    let manifest = Manifest::new(name).expect("valid name").with_dependencies(deps);
    std::fs::write(dir.path().join(MANIFEST_FILE), manifest.to_vec().unwrap()).unwrap();
    std::fs::create_dir(dir.path().join(ROOTFS_DIR)).unwrap();
    for (path, data) in files {
        write_file(&dir.path().join(ROOTFS_DIR), path, data);
    }

    let mut tmp = store.tmp_file().unwrap();
    archive::build_archive(dir.path(), tmp.as_file_mut()).unwrap();
    let key = store.write_archive(tmp).unwrap();
    store.dependency_for(&key).unwrap()
}

pub fn write_file(root: &Path, path: &str, data: &[u8]) {
    let full = root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, data).unwrap();
}

pub fn key_of(dep: &Dependency) -> Blake3Hash {
    dep.image_id.expect("pinned dependency")
}

/// Every non-manifest entry of a stored archive: path -> contents
pub fn payload(store: &Store, key: &Blake3Hash) -> BTreeMap<PathBuf, Vec<u8>> {
    let mut out = BTreeMap::new();
    let mut tar = tar::Archive::new(store.read_stream(key).unwrap());
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().into_owned();
        if path == Path::new(MANIFEST_FILE) {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        out.insert(path, data);
    }
    out
}
