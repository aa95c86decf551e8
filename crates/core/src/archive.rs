//! Image archive codec
//!
//! An image archive is a tar stream holding a top-level `manifest` file and a
//! `rootfs/` tree. Archives handed in by users may be gzip compressed; the
//! store only ever holds the plain tar.

use crate::error::{Error, IoContext, Result};
use crate::manifest::Manifest;
use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType};
use tracing::debug;

/// Name of the manifest entry at the archive root
pub const MANIFEST_FILE: &str = "manifest";

/// Directory holding the layer's filesystem
pub const ROOTFS_DIR: &str = "rootfs";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest manifest entry accepted when decoding
pub const MAX_MANIFEST_LEN: u64 = 1 << 20;

/// Strip `.` components so `./manifest` and `manifest/` compare equal.
fn clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn is_manifest(path: &Path) -> bool {
    clean(path) == Path::new(MANIFEST_FILE)
}

/// Wrap a reader so gzip input is transparently decompressed.
pub fn decompressed<'a, R: Read + 'a>(reader: R) -> Result<Box<dyn Read + 'a>> {
    let mut reader = BufReader::new(reader);
    let is_gzip = reader
        .fill_buf()
        .io_context(|| "peeking at archive header")?
        .starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Read the manifest entry out of an archive stream.
pub fn read_manifest<R: Read>(reader: R) -> Result<Manifest> {
    let mut archive = Archive::new(reader);
    let entries = archive.entries().io_context(|| "reading archive entries")?;
    for entry in entries {
        let mut entry = entry.io_context(|| "reading archive entry")?;
        let path = entry.path().io_context(|| "reading entry path")?.into_owned();
        if is_manifest(&path) {
            let size = entry.size();
            if size > MAX_MANIFEST_LEN {
                return Err(Error::decode(
                    "image manifest",
                    format!("entry claims {} bytes, limit is {}", size, MAX_MANIFEST_LEN),
                ));
            }
            let mut bytes = Vec::new();
            (&mut entry)
                .take(size)
                .read_to_end(&mut bytes)
                .io_context(|| "reading manifest entry")?;
            if (bytes.len() as u64) < size {
                return Err(Error::decode(
                    "image manifest",
                    format!("truncated: {} of {} bytes", bytes.len(), size),
                ));
            }
            return Manifest::from_slice(&bytes);
        }
    }
    Err(Error::decode("image archive", "no manifest entry"))
}

/// Copy an archive entry for entry, substituting the manifest body.
///
/// The manifest header is regenerated so its size field matches the new
/// body. All other entries keep their header fields and contents.
pub fn rewrite_manifest<R: Read, W: Write>(reader: R, writer: W, manifest: &Manifest) -> Result<W> {
    let body = manifest.to_vec()?;
    let mut archive = Archive::new(reader);
    let mut builder = Builder::new(writer);
    let mut replaced = false;

    let entries = archive.entries().io_context(|| "reading archive entries")?;
    for entry in entries {
        let mut entry = entry.io_context(|| "reading archive entry")?;
        let path = entry.path().io_context(|| "reading entry path")?.into_owned();
        let mut header = entry.header().clone();

        if is_manifest(&path) {
            header.set_size(body.len() as u64);
            builder
                .append_data(&mut header, &path, body.as_slice())
                .io_context(|| "writing manifest entry")?;
            replaced = true;
            continue;
        }

        let link = entry
            .link_name()
            .io_context(|| format!("reading link target of {}", path.display()))?
            .map(|l| l.into_owned());
        match link {
            Some(target) => builder
                .append_link(&mut header, &path, &target)
                .io_context(|| format!("copying link {}", path.display()))?,
            None => builder
                .append_data(&mut header, &path, &mut entry)
                .io_context(|| format!("copying entry {}", path.display()))?,
        }
    }

    if !replaced {
        return Err(Error::decode("image archive", "no manifest entry"));
    }
    builder.into_inner().io_context(|| "finishing archive")
}

/// Check that `dir` holds exactly a `manifest` file and a `rootfs` directory.
pub fn validate_layout(dir: &Path) -> Result<Manifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let rootfs_path = dir.join(ROOTFS_DIR);

    if !manifest_path.is_file() {
        return Err(Error::InvalidLayout(format!("{} is missing", manifest_path.display())));
    }
    if !rootfs_path.is_dir() {
        return Err(Error::InvalidLayout(format!("{} is not a directory", rootfs_path.display())));
    }
    for entry in fs::read_dir(dir).io_context(|| format!("listing {}", dir.display()))? {
        let entry = entry.io_context(|| format!("listing {}", dir.display()))?;
        let name = entry.file_name();
        if name != MANIFEST_FILE && name != ROOTFS_DIR {
            return Err(Error::InvalidLayout(format!(
                "unexpected top-level entry {}",
                name.to_string_lossy()
            )));
        }
    }

    let bytes = fs::read(&manifest_path).io_context(|| format!("reading {}", manifest_path.display()))?;
    Manifest::from_slice(&bytes)
}

/// Serialize an image directory into an uncompressed archive.
///
/// The manifest is written first, then the rootfs in sorted path order.
pub fn build_archive<W: Write>(dir: &Path, writer: W) -> Result<W> {
    let manifest = validate_layout(dir)?;
    let mut builder = Builder::new(writer);
    builder.follow_symlinks(false);

    builder
        .append_path_with_name(dir.join(MANIFEST_FILE), MANIFEST_FILE)
        .io_context(|| "adding manifest")?;

    let rootfs = dir.join(ROOTFS_DIR);
    for entry in walkdir::WalkDir::new(&rootfs).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::io(format!("walking {}", rootfs.display()), e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::InvalidLayout(e.to_string()))?;
        builder
            .append_path_with_name(entry.path(), rel)
            .io_context(|| format!("adding {}", rel.display()))?;
    }

    debug!(image = %manifest.name, dir = %dir.display(), "built image archive");
    builder.into_inner().io_context(|| "finishing archive")
}

/// Map an archive path inside `rootfs/` to a path relative to the rootfs.
///
/// Returns `None` for entries outside the rootfs and for the rootfs
/// directory itself.
fn rootfs_relative(path: &Path) -> Result<Option<PathBuf>> {
    let path = clean(path);
    let rel = match path.strip_prefix(ROOTFS_DIR) {
        Ok(rel) => rel,
        Err(_) => return Ok(None),
    };
    if rel.as_os_str().is_empty() {
        return Ok(None);
    }
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(Error::InvalidLayout(format!(
            "path traversal in archive entry {}",
            path.display()
        )));
    }
    Ok(Some(rel.to_path_buf()))
}

/// Path for writing `rel` below `root`, creating missing parent directories.
///
/// `root` must be canonical. Every existing ancestor of the target must
/// resolve to a directory inside `root`, so a symlink left by this or an
/// earlier layer cannot redirect writes out of it. A non-directory in the
/// way is replaced by a directory.
fn target_inside(root: &Path, rel: &Path) -> Result<PathBuf> {
    let escape = || Error::InvalidLayout(format!("{} escapes the destination", rel.display()));
    let mut dir = root.to_path_buf();
    if let Some(parent) = rel.parent() {
        for component in parent.components() {
            dir.push(component);
            match fs::symlink_metadata(&dir) {
                Ok(_) => match fs::canonicalize(&dir) {
                    Ok(real) if !real.starts_with(root) => return Err(escape()),
                    Ok(real) if real.is_dir() => dir = real,
                    // Dangling link or plain file
                    _ => {
                        fs::remove_file(&dir).io_context(|| format!("replacing {}", dir.display()))?;
                        fs::create_dir(&dir).io_context(|| format!("creating {}", dir.display()))?;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    fs::create_dir(&dir).io_context(|| format!("creating {}", dir.display()))?;
                }
                Err(e) => return Err(Error::io(format!("inspecting {}", dir.display()), e)),
            }
        }
    }
    let name = rel.file_name().ok_or_else(escape)?;
    Ok(dir.join(name))
}

/// Extract the `rootfs/` entries of an archive into `dest`.
///
/// Existing files in `dest` are overwritten; an existing symlink at an entry's
/// path is replaced, never followed. Entries that would land outside `dest`
/// through a symlink are rejected with `InvalidLayout`.
pub fn unpack_rootfs<R: Read>(reader: R, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).io_context(|| format!("creating {}", dest.display()))?;
    let root = fs::canonicalize(dest).io_context(|| format!("resolving {}", dest.display()))?;

    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    let mut count = 0;

    let entries = archive.entries().io_context(|| "reading archive entries")?;
    for entry in entries {
        let mut entry = entry.io_context(|| "reading archive entry")?;
        let path = entry.path().io_context(|| "reading entry path")?.into_owned();
        let rel = match rootfs_relative(&path)? {
            Some(rel) => rel,
            None => continue,
        };
        let target = target_inside(&root, &rel)?;
        if target.symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false) {
            fs::remove_file(&target).io_context(|| format!("replacing {}", target.display()))?;
        }

        if entry.header().entry_type() == EntryType::Link {
            let link = entry
                .link_name()
                .io_context(|| format!("reading link target of {}", path.display()))?
                .ok_or_else(|| Error::decode("image archive", format!("hard link {} has no target", path.display())))?;
            let source = rootfs_relative(&link)?
                .ok_or_else(|| Error::InvalidLayout(format!("hard link {} leaves rootfs", path.display())))?;
            let source = fs::canonicalize(root.join(&source))
                .io_context(|| format!("resolving link target of {}", path.display()))?;
            if !source.starts_with(&root) {
                return Err(Error::InvalidLayout(format!(
                    "hard link {} points outside the destination",
                    path.display()
                )));
            }
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target).io_context(|| format!("replacing {}", target.display()))?;
            }
            fs::hard_link(&source, &target).io_context(|| format!("linking {}", target.display()))?;
        } else {
            entry
                .unpack(&target)
                .io_context(|| format!("unpacking {}", rel.display()))?;
        }
        count += 1;
    }
    Ok(count)
}
