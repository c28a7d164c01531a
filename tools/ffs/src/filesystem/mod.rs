mod disk;

pub use disk::DiskFilesystem;

use std::fs::OpenOptions;
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("index {index} out of range for path of {len} components")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("slice {start}..{end} out of range for path of {len} components")]
    SliceOutOfRange { start: usize, end: usize, len: usize },

    #[error("invalid open mode: {0:?}")]
    InvalidMode(String),
}

impl FsError {
    /// The underlying OS error kind, if this is an OS failure.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            FsError::Io(e) => Some(e.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

/// How a resource is opened, named after the conventional mode strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// `r`
    #[default]
    Read,
    /// `w`: create or truncate
    Write,
    /// `a`: create, write at end
    Append,
    /// `r+`
    ReadWrite,
    /// `w+`
    ReadWriteTruncate,
    /// `a+`
    ReadAppend,
    /// `x`: create, fail if present
    CreateNew,
}

impl OpenMode {
    pub fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::ReadWriteTruncate => {
                options.read(true).write(true).create(true).truncate(true)
            }
            OpenMode::ReadAppend => options.read(true).append(true).create(true),
            OpenMode::CreateNew => options.write(true).create_new(true),
        };
        options
    }
}

impl FromStr for OpenMode {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self> {
        // Text and binary are the same thing here.
        let stripped: String = s.chars().filter(|c| !matches!(c, 'b' | 't')).collect();
        match stripped.as_str() {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            "r+" => Ok(OpenMode::ReadWrite),
            "w+" => Ok(OpenMode::ReadWriteTruncate),
            "a+" => Ok(OpenMode::ReadAppend),
            "x" => Ok(OpenMode::CreateNew),
            _ => Err(FsError::InvalidMode(s.to_string())),
        }
    }
}

/// Metadata about a resource, as reported by the backend.
#[derive(Debug, Clone)]
pub struct Stat {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub accessed: SystemTime,
    /// Permission bits; zero where the platform has none.
    pub mode: u32,
    pub readonly: bool,
    pub is_directory: bool,
    pub is_symlink: bool,
}

/// A filesystem-like backend.
///
/// Relative paths are interpreted against the backend's own working
/// directory. OS failures are returned unchanged as [`FsError::Io`].
pub trait Filesystem {
    type File: io::Read + io::Write;

    /// The node separator used by this filesystem.
    fn separator(&self) -> char;

    fn exists(&self, resource: impl AsRef<Path>) -> bool;

    fn working_directory(&self) -> PathBuf;

    /// Direct children of `branch`, as full paths in sorted order.
    fn list(&self, branch: impl AsRef<Path>) -> Result<Vec<PathBuf>>;

    /// Changes the working directory until the next `cd`.
    fn cd(&mut self, target: impl AsRef<Path>) -> Result<()>;

    /// Puts back a working directory saved by [`Filesystem::cd_scoped`].
    /// Unlike `cd` it cannot fail: the directory may have been removed
    /// since it was saved.
    fn restore_working_directory(&mut self, previous: PathBuf);

    /// Changes the working directory for as long as the returned guard
    /// lives. The previous directory is restored when the guard drops,
    /// whichever way the scope is left.
    fn cd_scoped(&mut self, target: impl AsRef<Path>) -> Result<DirectoryGuard<'_, Self>>
    where
        Self: Sized,
    {
        let previous = self.working_directory();
        self.cd(target)?;
        Ok(DirectoryGuard { fs: self, previous })
    }

    fn is_absolute_path(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref()
            .to_string_lossy()
            .starts_with(self.separator())
    }

    fn open(&self, resource: impl AsRef<Path>, mode: OpenMode) -> Result<Self::File>;

    /// Is `resource` a directory?
    fn is_branch(&self, resource: impl AsRef<Path>) -> bool;

    /// Is `resource` a regular file?
    fn is_leaf(&self, resource: impl AsRef<Path>) -> bool;

    fn absolute_path(&self, resource: impl AsRef<Path>) -> PathBuf;

    fn parent(&self, resource: impl AsRef<Path>) -> PathBuf;

    /// Creates exactly one directory; missing parents are an error.
    fn make_directory(&self, path: impl AsRef<Path>) -> Result<()>;

    /// `mkdir -p`. A directory that already exists counts as created; any
    /// other failure is returned as is.
    fn make_directory_recursive(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut ancestors: Vec<&Path> = path
            .ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        ancestors.reverse();

        for dir in ancestors {
            match self.make_directory(dir) {
                Ok(()) => {}
                Err(e) if e.io_kind() == Some(io::ErrorKind::AlreadyExists) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Copies contents and metadata. Copies into `target` when it is a
    /// directory.
    fn copy(&self, resource: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()>;

    fn move_to(&self, resource: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()>;

    fn link(
        &self,
        resource: impl AsRef<Path>,
        target: impl AsRef<Path>,
        symbolic: bool,
    ) -> Result<()>;

    /// Creates an empty leaf if absent. Existing leaves are left alone.
    fn touch(&self, resource: impl AsRef<Path>) -> Result<()>;

    /// Picks a fresh name, creates it with [`Filesystem::touch`] and returns
    /// its path.
    fn create_temporary_file(&self) -> Result<PathBuf>;

    fn stat(&self, resource: impl AsRef<Path>) -> Result<Stat>;

    /// Removes a single leaf. Directories are not removed.
    fn remove(&self, resource: impl AsRef<Path>) -> Result<()>;
}

/// Returned by [`Filesystem::cd_scoped`]. Derefs to the filesystem.
pub struct DirectoryGuard<'a, F: Filesystem> {
    fs: &'a mut F,
    previous: PathBuf,
}

impl<F: Filesystem> DirectoryGuard<'_, F> {
    /// The directory that will be restored.
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl<F: Filesystem> Deref for DirectoryGuard<'_, F> {
    type Target = F;

    fn deref(&self) -> &F {
        self.fs
    }
}

impl<F: Filesystem> DerefMut for DirectoryGuard<'_, F> {
    fn deref_mut(&mut self) -> &mut F {
        self.fs
    }
}

impl<F: Filesystem> Drop for DirectoryGuard<'_, F> {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        self.fs.restore_working_directory(previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_from_str() {
        assert_eq!("r".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("rb".parse::<OpenMode>().unwrap(), OpenMode::Read);
        assert_eq!("w".parse::<OpenMode>().unwrap(), OpenMode::Write);
        assert_eq!("a+".parse::<OpenMode>().unwrap(), OpenMode::ReadAppend);
        assert_eq!("r+b".parse::<OpenMode>().unwrap(), OpenMode::ReadWrite);
        assert!(matches!(
            "q".parse::<OpenMode>(),
            Err(FsError::InvalidMode(mode)) if mode == "q"
        ));
    }

    #[test]
    fn test_io_kind() {
        let err = FsError::from(io::Error::from(io::ErrorKind::AlreadyExists));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::AlreadyExists));
        let err = FsError::IndexOutOfRange { index: 1, len: 0 };
        assert_eq!(err.io_kind(), None);
    }
}
