//! In-memory [`Filesystem`] double for tests.
//!
//! Paths are stored as given after joining with the working directory; no
//! normalisation happens. Links are plain copies. Handles returned by
//! `open` buffer their content and write it back on `flush` and on drop.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::filesystem::{Filesystem, FsError, OpenMode, Result, Stat};

#[derive(Debug, Clone)]
struct MockFile {
    content: Vec<u8>,
    modified: SystemTime,
}

/// File handle returned by [`MockFilesystem::open`].
#[derive(Debug)]
pub struct MockHandle {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    path: PathBuf,
    buffer: Cursor<Vec<u8>>,
    writable: bool,
    append: bool,
    dirty: bool,
}

impl MockHandle {
    fn write_back(&mut self) {
        if !self.dirty {
            return;
        }
        let mut files = self.files.lock().unwrap();
        files.insert(
            self.path.clone(),
            MockFile {
                content: self.buffer.get_ref().clone(),
                modified: SystemTime::now(),
            },
        );
        self.dirty = false;
    }
}

impl Read for MockHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Write for MockHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is open read-only", self.path.display()),
            ));
        }
        if self.append {
            self.buffer.seek(SeekFrom::End(0))?;
        }
        let written = self.buffer.write(buf)?;
        self.dirty = true;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_back();
        Ok(())
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.write_back();
    }
}

#[derive(Debug, Clone)]
pub struct MockFilesystem {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    directories: Arc<Mutex<BTreeSet<PathBuf>>>,
    mkdir_failures: Arc<Mutex<HashMap<PathBuf, io::ErrorKind>>>,
    temp_counter: Arc<AtomicUsize>,
    cwd: PathBuf,
}

impl Default for MockFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFilesystem {
    /// An empty tree holding only `/`, with `/` as working directory.
    pub fn new() -> Self {
        let mut directories = BTreeSet::new();
        directories.insert(PathBuf::from("/"));
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            directories: Arc::new(Mutex::new(directories)),
            mkdir_failures: Arc::new(Mutex::new(HashMap::new())),
            temp_counter: Arc::new(AtomicUsize::new(0)),
            cwd: PathBuf::from("/"),
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: Vec<u8>, modified: SystemTime) {
        let path = path.into();
        let mut files = self.files.lock().unwrap();
        files.insert(path, MockFile { content, modified });
    }

    pub fn add_directory(&self, path: impl Into<PathBuf>) {
        self.directories.lock().unwrap().insert(path.into());
    }

    pub fn get_file_content(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files.get(path).map(|f| f.content.clone())
    }

    /// Makes every later `make_directory(path)` fail with `kind`.
    pub fn fail_make_directory(&self, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.mkdir_failures.lock().unwrap().insert(path.into(), kind);
    }

    fn resolve(&self, resource: impl AsRef<Path>) -> PathBuf {
        self.cwd.join(resource)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.directories.lock().unwrap().contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn not_found(path: &Path) -> FsError {
        io::Error::new(io::ErrorKind::NotFound, path.display().to_string()).into()
    }

    fn into_directory(&self, resource: &Path, target: PathBuf) -> PathBuf {
        match resource.file_name() {
            Some(name) if self.is_dir(&target) => target.join(name),
            _ => target,
        }
    }
}

impl Filesystem for MockFilesystem {
    type File = MockHandle;

    fn separator(&self) -> char {
        '/'
    }

    fn exists(&self, resource: impl AsRef<Path>) -> bool {
        let path = self.resolve(resource);
        self.is_file(&path) || self.is_dir(&path)
    }

    fn working_directory(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn list(&self, branch: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let branch = self.resolve(branch);
        if !self.is_dir(&branch) {
            return Err(Self::not_found(&branch));
        }
        let files = self.files.lock().unwrap();
        let directories = self.directories.lock().unwrap();
        let mut children: Vec<PathBuf> = files
            .keys()
            .chain(directories.iter())
            .filter(|p| p.parent() == Some(branch.as_path()))
            .cloned()
            .collect();
        children.sort();
        Ok(children)
    }

    fn cd(&mut self, target: impl AsRef<Path>) -> Result<()> {
        let target = self.resolve(target);
        if !self.is_dir(&target) {
            return Err(Self::not_found(&target));
        }
        self.cwd = target;
        Ok(())
    }

    fn restore_working_directory(&mut self, previous: PathBuf) {
        self.cwd = previous;
    }

    fn open(&self, resource: impl AsRef<Path>, mode: OpenMode) -> Result<Self::File> {
        let path = self.resolve(resource);
        if self.is_dir(&path) {
            return Err(io::Error::from(io::ErrorKind::IsADirectory).into());
        }
        let existing = self.get_file_content(&path);
        let content = match (mode, existing) {
            (OpenMode::CreateNew, Some(_)) => {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists).into());
            }
            (OpenMode::Read | OpenMode::ReadWrite, None) => {
                return Err(Self::not_found(&path));
            }
            (OpenMode::Write | OpenMode::ReadWriteTruncate | OpenMode::CreateNew, _) => {
                Vec::new()
            }
            (_, existing) => existing.unwrap_or_default(),
        };
        let mut handle = MockHandle {
            files: Arc::clone(&self.files),
            path,
            buffer: Cursor::new(content),
            writable: mode != OpenMode::Read,
            append: matches!(mode, OpenMode::Append | OpenMode::ReadAppend),
            // Creating or truncating shows up before the first write.
            dirty: mode != OpenMode::Read,
        };
        handle.write_back();
        Ok(handle)
    }

    fn is_branch(&self, resource: impl AsRef<Path>) -> bool {
        self.is_dir(&self.resolve(resource))
    }

    fn is_leaf(&self, resource: impl AsRef<Path>) -> bool {
        self.is_file(&self.resolve(resource))
    }

    fn absolute_path(&self, resource: impl AsRef<Path>) -> PathBuf {
        self.resolve(resource)
    }

    fn parent(&self, resource: impl AsRef<Path>) -> PathBuf {
        resource
            .as_ref()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn make_directory(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(path);
        if let Some(kind) = self.mkdir_failures.lock().unwrap().get(&path) {
            return Err(io::Error::from(*kind).into());
        }
        if self.is_dir(&path) || self.is_file(&path) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists).into());
        }
        match path.parent() {
            Some(parent) if !self.is_dir(parent) => Err(Self::not_found(parent)),
            _ => {
                self.add_directory(path);
                Ok(())
            }
        }
    }

    fn copy(&self, resource: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
        let from = self.resolve(resource);
        let to = self.into_directory(&from, self.resolve(target));
        let mut files = self.files.lock().unwrap();
        let source = files
            .get(&from)
            .cloned()
            .ok_or_else(|| Self::not_found(&from))?;
        files.insert(to, source);
        Ok(())
    }

    fn move_to(&self, resource: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
        let from = self.resolve(resource);
        let to = self.into_directory(&from, self.resolve(target));
        let mut files = self.files.lock().unwrap();
        let source = files.remove(&from).ok_or_else(|| Self::not_found(&from))?;
        files.insert(to, source);
        Ok(())
    }

    fn link(
        &self,
        resource: impl AsRef<Path>,
        target: impl AsRef<Path>,
        _symbolic: bool,
    ) -> Result<()> {
        let target = self.resolve(target);
        if self.exists(&target) {
            return Err(io::Error::from(io::ErrorKind::AlreadyExists).into());
        }
        self.copy(resource, target)
    }

    fn touch(&self, resource: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(resource);
        let mut files = self.files.lock().unwrap();
        files.entry(path).or_insert_with(|| MockFile {
            content: Vec::new(),
            modified: SystemTime::now(),
        });
        Ok(())
    }

    fn create_temporary_file(&self) -> Result<PathBuf> {
        self.add_directory("/tmp");
        let n = self.temp_counter.fetch_add(1, Ordering::SeqCst);
        let path = PathBuf::from(format!("/tmp/mock{n}"));
        self.touch(&path)?;
        Ok(path)
    }

    fn stat(&self, resource: impl AsRef<Path>) -> Result<Stat> {
        let path = self.resolve(resource);
        let files = self.files.lock().unwrap();
        let (size, modified, is_directory) = match files.get(&path) {
            Some(file) => (file.content.len() as u64, file.modified, false),
            None if self.is_dir(&path) => (0, SystemTime::UNIX_EPOCH, true),
            None => return Err(Self::not_found(&path)),
        };
        Ok(Stat {
            path,
            size,
            modified,
            accessed: modified,
            mode: if is_directory { 0o755 } else { 0o644 },
            readonly: false,
            is_directory,
            is_symlink: false,
        })
    }

    fn remove(&self, resource: impl AsRef<Path>) -> Result<()> {
        let path = self.resolve(resource);
        if self.is_dir(&path) {
            return Err(io::Error::from(io::ErrorKind::IsADirectory).into());
        }
        let mut files = self.files.lock().unwrap();
        files
            .remove(&path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(&path))
    }
}
