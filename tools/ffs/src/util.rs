use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

pub fn is_dir(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_dir()
}

pub fn is_file(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// The last `num` components of `path`.
///
/// ```
/// assert_eq!(ffs::util::basen("/foo/bar/car/goo.txt", 2), "car/goo.txt");
/// ```
pub fn basen(path: &str, num: usize) -> String {
    let path = crate::Path::new(path);
    let start = path.len().saturating_sub(num);
    path.slice(start..)
        .map(crate::Path::into_string)
        .unwrap_or_default()
}

/// Files under `dir` last modified strictly before `cutoff`, sorted.
pub fn lsmtime(dir: impl AsRef<Path>, cutoff: DateTime<Utc>) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let modified: DateTime<Utc> = entry.metadata().map_err(io::Error::from)?.modified()?.into();
        if modified < cutoff {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

/// Size of the file as a hex string such as `0x17`; `None` if it cannot be
/// stat'ed.
pub fn hsize(path: impl AsRef<Path>) -> Option<String> {
    fs::metadata(path).ok().map(|m| format!("{:#x}", m.len()))
}
