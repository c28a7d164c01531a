use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use super::{Filesystem, OpenMode, Result, Stat};
use crate::nix;

/// Environment variable overriding where temporary files are created.
pub const TMPDIR_ENV: &str = "FFS_TMPDIR";

/// The local disk, reached through `std::fs`.
///
/// Keeps its own working directory instead of the process-wide one, so
/// `cd` on one value never affects another value or the rest of the
/// process.
#[derive(Debug, Clone)]
pub struct DiskFilesystem {
    cwd: PathBuf,
    temp_dir: PathBuf,
}

impl DiskFilesystem {
    /// Starts in the process working directory.
    pub fn new() -> Result<Self> {
        Self::with_working_directory(env::current_dir()?)
    }

    /// Starts in `cwd`, made absolute against the process working directory
    /// when relative. Fails only when that directory is needed and cannot
    /// be read.
    pub fn with_working_directory(cwd: impl Into<PathBuf>) -> Result<Self> {
        let cwd = cwd.into();
        let cwd = if cwd.is_absolute() {
            normalize(&cwd)
        } else {
            normalize(&env::current_dir()?.join(cwd))
        };
        let temp_dir = env::var_os(TMPDIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);
        Ok(Self { cwd, temp_dir })
    }

    /// Sets where temporary files go. A relative directory resolves against
    /// the working directory at the time a file is created.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    fn resolve(&self, resource: impl AsRef<Path>) -> PathBuf {
        self.cwd.join(resource)
    }
}

/// Lexically removes `.` and `..` components. `..` at the root stays at the
/// root.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(parent) = result.parent() {
                    result = parent.to_path_buf();
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Creates `path` only if nothing is there yet, so tempfile retries with a
/// fresh name on a collision.
fn claim(path: &Path) -> io::Result<()> {
    OpenOptions::new().write(true).create_new(true).open(path)?;
    nix::touch(path)
}

impl Filesystem for DiskFilesystem {
    type File = File;

    fn separator(&self) -> char {
        MAIN_SEPARATOR
    }

    fn exists(&self, resource: impl AsRef<Path>) -> bool {
        self.resolve(resource).exists()
    }

    fn working_directory(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn list(&self, branch: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let mut children = fs::read_dir(self.resolve(branch))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();
        Ok(children)
    }

    fn cd(&mut self, target: impl AsRef<Path>) -> Result<()> {
        let target = self.absolute_path(target);
        let metadata = fs::metadata(&target)?;
        if !metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("not a directory: {}", target.display()),
            )
            .into());
        }
        log::debug!("cd {} -> {}", self.cwd.display(), target.display());
        self.cwd = target;
        Ok(())
    }

    fn restore_working_directory(&mut self, previous: PathBuf) {
        if !previous.is_dir() {
            log::warn!("restoring working directory {} which is gone", previous.display());
        }
        log::debug!("cd {} -> {} (restore)", self.cwd.display(), previous.display());
        self.cwd = previous;
    }

    fn open(&self, resource: impl AsRef<Path>, mode: OpenMode) -> Result<File> {
        Ok(mode.options().open(self.resolve(resource))?)
    }

    fn is_branch(&self, resource: impl AsRef<Path>) -> bool {
        crate::util::is_dir(self.resolve(resource))
    }

    fn is_leaf(&self, resource: impl AsRef<Path>) -> bool {
        crate::util::is_file(self.resolve(resource))
    }

    fn absolute_path(&self, resource: impl AsRef<Path>) -> PathBuf {
        normalize(&self.resolve(resource))
    }

    fn parent(&self, resource: impl AsRef<Path>) -> PathBuf {
        let value = resource.as_ref().to_string_lossy();
        let sep = self.separator();
        match value.rfind(sep) {
            None => PathBuf::new(),
            Some(i) => {
                let head = &value[..i + sep.len_utf8()];
                let trimmed = head.trim_end_matches(sep);
                if trimmed.is_empty() {
                    PathBuf::from(head)
                } else {
                    PathBuf::from(trimmed)
                }
            }
        }
    }

    fn make_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(nix::mkdir(self.resolve(path))?)
    }

    fn make_directory_recursive(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(nix::mkdir_p(self.resolve(path))?)
    }

    fn copy(&self, resource: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
        Ok(nix::cp(self.resolve(resource), self.resolve(target))?)
    }

    fn move_to(&self, resource: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
        Ok(nix::mv(self.resolve(resource), self.resolve(target))?)
    }

    fn link(
        &self,
        resource: impl AsRef<Path>,
        target: impl AsRef<Path>,
        symbolic: bool,
    ) -> Result<()> {
        let target = self.resolve(target);
        if symbolic {
            // A symlink stores its source verbatim.
            nix::ln_s(resource, target)?;
        } else {
            nix::ln(self.resolve(resource), target)?;
        }
        Ok(())
    }

    fn touch(&self, resource: impl AsRef<Path>) -> Result<()> {
        Ok(nix::touch(self.resolve(resource))?)
    }

    fn create_temporary_file(&self) -> Result<PathBuf> {
        let dir = self.absolute_path(&self.temp_dir);
        let file = tempfile::Builder::new()
            .prefix("ffs")
            .make_in(&dir, claim)?;
        let ((), path) = file.keep().map_err(io::Error::from)?;
        log::debug!("created temporary file {}", path.display());
        Ok(path)
    }

    fn stat(&self, resource: impl AsRef<Path>) -> Result<Stat> {
        Ok(nix::stat(self.resolve(resource))?)
    }

    fn remove(&self, resource: impl AsRef<Path>) -> Result<()> {
        Ok(nix::rm(&[self.resolve(resource)])?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/foo/././bar")), Path::new("/foo/bar"));
        assert_eq!(normalize(Path::new("/foo/./../bar")), Path::new("/bar"));
        assert_eq!(normalize(Path::new("/../../..")), Path::new("/"));
        assert_eq!(normalize(Path::new("/a/b/../c/")), Path::new("/a/c"));
    }

    #[test]
    fn test_absolute_path() {
        let fs = DiskFilesystem::with_working_directory("/current/working/dir").unwrap();
        assert_eq!(fs.absolute_path("foo"), Path::new("/current/working/dir/foo"));
        assert_eq!(fs.absolute_path("../foo"), Path::new("/current/working/foo"));
        assert_eq!(fs.absolute_path("/etc/hosts"), Path::new("/etc/hosts"));
        assert_eq!(fs.absolute_path("."), Path::new("/current/working/dir"));
        assert_eq!(fs.absolute_path(""), Path::new("/current/working/dir"));
    }

    #[test]
    fn test_parent() {
        let fs = DiskFilesystem::with_working_directory("/").unwrap();
        assert_eq!(fs.parent("/foo/bar"), Path::new("/foo"));
        assert_eq!(fs.parent("/foo/bar/"), Path::new("/foo/bar"));
        assert_eq!(fs.parent("/foo"), Path::new("/"));
        assert_eq!(fs.parent("/"), Path::new("/"));
        assert_eq!(fs.parent("foo"), Path::new(""));
        assert_eq!(fs.parent("foo/bar"), Path::new("foo"));
        assert_eq!(fs.parent("//foo"), Path::new("//"));
    }

    #[test]
    fn test_is_absolute_path() {
        let fs = DiskFilesystem::with_working_directory("/").unwrap();
        assert!(fs.is_absolute_path("/tmp"));
        assert!(!fs.is_absolute_path("tmp"));
        assert!(!fs.is_absolute_path(""));
        assert_eq!(fs.separator(), '/');
    }

    #[test]
    fn test_relative_working_directory_is_made_absolute() {
        let fs = DiskFilesystem::with_working_directory("some/where").unwrap();
        assert!(fs.working_directory().is_absolute());
        assert!(fs.working_directory().ends_with("some/where"));
    }

    #[test]
    fn test_claim_refuses_existing_files() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("taken");
        claim(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        fs::write(&path, "someone else's").unwrap();
        let err = claim(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&path).unwrap(), "someone else's");
    }
}
