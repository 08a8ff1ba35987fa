//! Recursive copy and removal of object trees.

use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Copy `source` to `dest`.
///
/// A directory is copied recursively into `dest`, which is created if
/// missing. A regular file is copied to the path `dest`. Returns the number of
/// files copied.
pub fn copy_tree(source: &Path, dest: &Path) -> io::Result<u64> {
    let meta = fs::metadata(source)?;
    if !meta.is_dir() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, dest)?;
        return Ok(1);
    }

    fs::create_dir_all(dest)?;
    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Remove `path` and everything below it.
pub fn remove_tree(path: &Path) -> io::Result<()> {
    fs::remove_dir_all(path)
}
