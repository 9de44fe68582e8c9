//! Gzip-compressed tar packaging of a checked-out tree
//!
//! Entries are written in sorted path order. Directories get no entry of
//! their own, symlinks are stored as links, regular files keep their mode.
//! A top-level `.git` directory is left out.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};

use crate::error::{ResolveError, Result};

/// Packs everything under `root` into an in-memory `.tar.gz`
pub fn pack_tree(root: &Path) -> Result<Vec<u8>> {
    let mut paths = Vec::new();
    collect(root, root, &mut paths)?;
    paths.sort();

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    for relative in &paths {
        let path = root.join(relative);
        let metadata = fs::symlink_metadata(&path)?;

        if metadata.file_type().is_symlink() {
            let target = fs::read_link(&path)?;
            let mut header = Header::new_gnu();
            header.set_metadata(&metadata);
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            builder
                .append_link(&mut header, relative, &target)
                .map_err(|e| archive_error(relative, e))?;
        } else {
            builder
                .append_path_with_name(&path, relative)
                .map_err(|e| archive_error(relative, e))?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ResolveError::Archive(format!("failed to finish tar archive: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ResolveError::Archive(format!("failed to finish gzip compression: {}", e)))
}

/// Relative paths of every file and symlink below `dir`
fn collect(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if dir == root && entry.file_name() == ".git" {
            continue;
        }

        if file_type.is_dir() {
            collect(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

fn archive_error(path: &Path, err: std::io::Error) -> ResolveError {
    ResolveError::Archive(format!("failed to add {}: {}", path.display(), err))
}
