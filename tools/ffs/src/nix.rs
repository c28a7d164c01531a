//! Unix-command flavoured wrappers over `std::fs`.
//!
//! Each function does what its namesake command does and nothing else.
//! Errors come straight from the OS; the one exception is [`mkdir_p`],
//! which treats "already exists" as success.

use std::env;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use filetime::FileTime;
use walkdir::WalkDir;

use crate::filesystem::Stat;

/// Guard returned by [`cd`]. Changes back to the starting directory when
/// dropped.
///
/// The working directory is process-wide state: two threads holding guards
/// at once will trample each other.
#[must_use = "the previous directory is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Cd {
    start: PathBuf,
    path: PathBuf,
}

impl Cd {
    /// The directory that was changed into.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stays in the new directory instead of changing back.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for Cd {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.start) {
            log::warn!("Failed to return to {}: {}", self.start.display(), e);
        }
    }
}

/// Changes the process working directory to `path`.
///
/// Keep the guard to change back at the end of a scope, or call
/// [`Cd::forget`] to make the change permanent.
pub fn cd(path: impl AsRef<Path>) -> io::Result<Cd> {
    let start = getwd()?;
    let path = path.as_ref().to_path_buf();
    env::set_current_dir(&path)?;
    log::debug!("cd {} -> {}", start.display(), path.display());
    Ok(Cd { start, path })
}

pub fn getwd() -> io::Result<PathBuf> {
    env::current_dir()
}

#[cfg(unix)]
pub fn chmod(path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Changes owner and group; `None` leaves that id as it is.
#[cfg(unix)]
pub fn chown(path: impl AsRef<Path>, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
    std::os::unix::fs::chown(&path, uid, gid)?;
    log::debug!("chown {:?}:{:?} {}", uid, gid, path.as_ref().display());
    Ok(())
}

/// True when both files have the same size and the same bytes.
pub fn cmp(a: impl AsRef<Path>, b: impl AsRef<Path>) -> io::Result<bool> {
    let (a, b) = (a.as_ref(), b.as_ref());
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    let mut left = BufReader::new(File::open(a)?);
    let mut right = BufReader::new(File::open(b)?);
    let mut lbuf = [0u8; 8192];
    let mut rbuf = [0u8; 8192];
    loop {
        let n = left.read(&mut lbuf)?;
        if n == 0 {
            return Ok(true);
        }
        right.read_exact(&mut rbuf[..n])?;
        if lbuf[..n] != rbuf[..n] {
            return Ok(false);
        }
    }
}

/// Copies a file with its permissions and timestamps. A directory `target`
/// receives the file under its own name.
pub fn cp(resource: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
    let resource = resource.as_ref();
    let target = into_directory(resource, target.as_ref());
    fs::copy(resource, &target)?;
    copy_times(resource, &target)?;
    log::debug!("cp {} -> {}", resource.display(), target.display());
    Ok(())
}

/// Copies the tree at `resource` to `target`, which must not exist yet.
pub fn cp_r(resource: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
    let (resource, target) = (resource.as_ref(), target.as_ref());
    if target.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        ));
    }
    for entry in WalkDir::new(resource) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(resource)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let dest = target.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir(&dest)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            symlink(&link, &dest)?;
        } else {
            cp(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// First `lines` lines of the file, newlines included.
pub fn head(filename: impl AsRef<Path>, lines: usize) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(filename)?);
    let mut out = Vec::new();
    for _ in 0..lines {
        if reader.read_until(b'\n', &mut out)? == 0 {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn ln(resource: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
    fs::hard_link(&resource, &target)?;
    log::debug!(
        "ln {} {}",
        resource.as_ref().display(),
        target.as_ref().display()
    );
    Ok(())
}

pub fn ln_s(resource: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
    symlink(resource.as_ref(), target.as_ref())?;
    log::debug!(
        "ln -s {} {}",
        resource.as_ref().display(),
        target.as_ref().display()
    );
    Ok(())
}

pub fn mkdir(path: impl AsRef<Path>) -> io::Result<()> {
    fs::create_dir(&path)?;
    log::debug!("mkdir {}", path.as_ref().display());
    Ok(())
}

/// `mkdir -p`: creates every missing directory in `path`.
///
/// Already existing is not an error; anything else is returned unchanged.
pub fn mkdir_p(path: impl AsRef<Path>) -> io::Result<()> {
    match fs::create_dir_all(&path) {
        Ok(()) => {
            log::debug!("mkdir -p {}", path.as_ref().display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Moves `resource` to `target`, or into it when `target` is a directory.
/// Files moved across devices are copied then removed.
pub fn mv(resource: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
    let resource = resource.as_ref();
    let target = into_directory(resource, target.as_ref());
    match fs::rename(resource, &target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices && resource.is_file() => {
            cp(resource, &target)?;
            fs::remove_file(resource)?;
        }
        Err(e) => return Err(e),
    }
    log::debug!("mv {} -> {}", resource.display(), target.display());
    Ok(())
}

/// Removes each target in turn, stopping at the first failure.
pub fn rm<P: AsRef<Path>>(targets: &[P]) -> io::Result<()> {
    for target in targets {
        fs::remove_file(target)?;
        log::debug!("rm {}", target.as_ref().display());
    }
    Ok(())
}

/// Removes one directory entry that is not a directory.
pub fn unlink(path: impl AsRef<Path>) -> io::Result<()> {
    fs::remove_file(&path)?;
    log::debug!("unlink {}", path.as_ref().display());
    Ok(())
}

pub fn rm_r(path: impl AsRef<Path>) -> io::Result<()> {
    fs::remove_dir_all(&path)?;
    log::debug!("rm -r {}", path.as_ref().display());
    Ok(())
}

pub fn rmdir(path: impl AsRef<Path>) -> io::Result<()> {
    fs::remove_dir(path)
}

/// Follows symlinks, like `stat(2)`; `is_symlink` reports whether `path`
/// itself is one.
pub fn stat(path: impl AsRef<Path>) -> io::Result<Stat> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)?;
    let is_symlink = fs::symlink_metadata(path)?.file_type().is_symlink();
    Ok(Stat {
        path: path.to_path_buf(),
        size: metadata.len(),
        modified: metadata.modified()?,
        accessed: metadata.accessed()?,
        mode: mode_of(&metadata),
        readonly: metadata.permissions().readonly(),
        is_directory: metadata.is_dir(),
        is_symlink,
    })
}

/// Creates `path` if it does not exist. Existing files keep their content
/// and timestamps.
pub fn touch(path: impl AsRef<Path>) -> io::Result<()> {
    OpenOptions::new().append(true).create(true).open(path)?;
    Ok(())
}

/// Looks `program` up on `PATH`.
///
/// A program with a directory part is checked as given. Not finding it is
/// `None`, never an error.
pub fn which(program: impl AsRef<Path>) -> Option<PathBuf> {
    let search_path = env::var_os("PATH").unwrap_or_default();
    which_in(program, &search_path)
}

/// [`which`] over an explicit search path in the platform's `PATH` format.
///
/// Any entry passing [`is_exe`] matches, so a searchable directory named
/// like the program is returned as well.
pub fn which_in(program: impl AsRef<Path>, search_path: &OsStr) -> Option<PathBuf> {
    let program = program.as_ref();
    let has_directory = program
        .parent()
        .is_some_and(|p| !p.as_os_str().is_empty());
    if has_directory {
        return is_exe(program).then(|| program.to_path_buf());
    }
    env::split_paths(search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_exe(candidate))
}

/// Exists and the calling user may execute it, as `access(2)` with `X_OK`
/// decides. On non-Unix platforms existing is enough.
#[cfg(unix)]
pub fn is_exe(path: impl AsRef<Path>) -> bool {
    rustix::fs::access(path.as_ref(), rustix::fs::Access::EXEC_OK).is_ok()
}

#[cfg(not(unix))]
pub fn is_exe(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(_metadata: &fs::Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink(original: &Path, link: &Path) -> io::Result<()> {
    if original.is_dir() {
        std::os::windows::fs::symlink_dir(original, link)
    } else {
        std::os::windows::fs::symlink_file(original, link)
    }
}

fn into_directory(resource: &Path, target: &Path) -> PathBuf {
    match resource.file_name() {
        Some(name) if target.is_dir() => target.join(name),
        _ => target.to_path_buf(),
    }
}

fn copy_times(from: &Path, to: &Path) -> io::Result<()> {
    let metadata = fs::metadata(from)?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(to, atime, mtime)
}
