use std::borrow::Borrow;
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::ops::{Bound, RangeBounds};
use std::path::MAIN_SEPARATOR;

use crate::filesystem::{FsError, OpenMode, Result};

const SEP: char = MAIN_SEPARATOR;

/// A pathname held as a plain string.
///
/// Component operations split the string on the separator, ignoring one
/// leading separator for absolute paths. Nothing is validated: a `Path` is a
/// thin wrapper, not a parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Path {
    value: String,
}

impl Path {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }

    /// True iff the first character is the separator.
    pub fn is_absolute(&self) -> bool {
        self.value.starts_with(SEP)
    }

    /// Live check against the disk. This is an I/O query, not a property of
    /// the value.
    pub fn exists(&self) -> bool {
        std::path::Path::new(&self.value).exists()
    }

    pub fn components(&self) -> Vec<&str> {
        let body = if self.is_absolute() {
            &self.value[SEP.len_utf8()..]
        } else {
            self.value.as_str()
        };
        body.split(SEP).collect()
    }

    /// Never zero: the empty path has one (empty) component.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.components().len()
    }

    pub fn component(&self, index: usize) -> Result<Path> {
        let components = self.components();
        components
            .get(index)
            .map(|c| Path::new(*c))
            .ok_or(FsError::IndexOutOfRange {
                index,
                len: components.len(),
            })
    }

    /// Selects a run of components. If the run starts at the first
    /// component of an absolute path, the result is absolute too.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Result<Path> {
        let components = self.components();
        let len = components.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        };
        let selected = components
            .get(start..end)
            .ok_or(FsError::SliceOutOfRange { start, end, len })?;

        let mut joined = selected.join(SEP.to_string().as_str());
        if start == 0 && !selected.is_empty() && self.is_absolute() {
            joined.insert(0, SEP);
        }
        Ok(Path::new(joined))
    }

    /// Replaces one component and re-joins the value.
    ///
    /// The absolute prefix of the original path is re-applied afterwards no
    /// matter what `value` contains, so assigning `"/x"` to component 0 of a
    /// relative path makes it absolute, and an absolute path stays absolute.
    pub fn set_component(&mut self, index: usize, value: &str) -> Result<()> {
        let absolute = self.is_absolute();
        let mut components: Vec<String> =
            self.components().into_iter().map(str::to_owned).collect();
        let len = components.len();
        let slot = components
            .get_mut(index)
            .ok_or(FsError::IndexOutOfRange { index, len })?;
        *slot = value.to_owned();
        if absolute {
            components[0].insert(0, SEP);
        }
        self.value = components.join(SEP.to_string().as_str());
        Ok(())
    }

    pub fn with_component_replaced(&self, index: usize, value: &str) -> Result<Path> {
        let mut replaced = self.clone();
        replaced.set_component(index, value)?;
        Ok(replaced)
    }

    /// Component-aligned membership.
    ///
    /// `item` must start at the beginning of the path or right after a
    /// separator, and end at a separator or the end of the path. An item
    /// that begins with the separator only matches at the start.
    pub fn contains(&self, item: &str) -> bool {
        if item.is_empty() {
            return false;
        }
        let ends_on_boundary = |at: usize| {
            item.ends_with(SEP) || matches!(self.value[at..].chars().next(), None | Some(SEP))
        };
        let matches_at = |start: usize| {
            self.value[start..].starts_with(item) && ends_on_boundary(start + item.len())
        };

        if item.starts_with(SEP) {
            return matches_at(0);
        }
        if matches_at(0) {
            return true;
        }
        self.value
            .match_indices(SEP)
            .any(|(i, _)| matches_at(i + SEP.len_utf8()))
    }

    /// `self + sep + other` as a new path.
    pub fn join(&self, other: &str) -> Path {
        Path::new(format!("{}{}{}", self.value, SEP, other))
    }

    /// In-place form of [`Path::join`].
    pub fn push(&mut self, other: &str) {
        self.value.push(SEP);
        self.value.push_str(other);
    }

    /// `base + sep + self`, rebuilt from the non-empty components of both.
    /// The result is absolute iff `base` is.
    pub fn prefixed_with(&self, base: &str) -> Path {
        let branches: Vec<&str> = base
            .split(SEP)
            .chain(self.components())
            .filter(|b| !b.is_empty())
            .collect();
        let mut value = branches.join(SEP.to_string().as_str());
        if base.starts_with(SEP) {
            value.insert(0, SEP);
        }
        Path::new(value)
    }

    /// Opens the file at this path. The handle closes when dropped.
    pub fn open(&self, mode: OpenMode) -> Result<File> {
        Ok(mode.options().open(&self.value)?)
    }

    /// Opens in read mode.
    pub fn reader(&self) -> Result<File> {
        self.open(OpenMode::Read)
    }

    /// Runs `f` with the file open; the file is closed on every exit path,
    /// including when `f` fails or panics.
    pub fn with_open<T, F>(&self, mode: OpenMode, f: F) -> Result<T>
    where
        F: FnOnce(&mut File) -> Result<T>,
    {
        let mut fh = self.open(mode)?;
        f(&mut fh)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// Must agree with `str`'s hash for the `Borrow<str>` lookups.
impl Hash for Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.as_str().hash(state);
    }
}

impl Borrow<str> for Path {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl AsRef<std::path::Path> for Path {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.value)
    }
}

impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Path::new(value)
    }
}

impl From<String> for Path {
    fn from(value: String) -> Self {
        Path::new(value)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.value
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl PartialEq<String> for Path {
    fn eq(&self, other: &String) -> bool {
        &self.value == other
    }
}

impl PartialEq<Path> for str {
    fn eq(&self, other: &Path) -> bool {
        self == other.value
    }
}

impl PartialEq<Path> for &str {
    fn eq(&self, other: &Path) -> bool {
        *self == other.value
    }
}

impl PartialEq<Path> for String {
    fn eq(&self, other: &Path) -> bool {
        *self == other.value
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::{self, Read, Write};
    use tempfile::TempDir;

    #[test]
    fn test_is_absolute() {
        assert!(Path::new("/foo/bar").is_absolute());
        assert!(Path::new("/").is_absolute());
        assert!(!Path::new("foo/bar").is_absolute());
        assert!(!Path::new("").is_absolute());
    }

    #[test]
    fn test_len_ignores_absolute_marker() {
        assert_eq!(Path::new("/foo/bar/baz").len(), 3);
        assert_eq!(Path::new("foo/bar/baz").len(), 3);
        assert_eq!(Path::new("foo").len(), 1);
        assert_eq!(Path::new("").len(), 1);
        assert_eq!(Path::new("/foo/").len(), 2);
    }

    #[test]
    fn test_component() {
        let path = Path::new("/foo/bar/baz");
        assert_eq!(path.component(0).unwrap(), "foo");
        assert_eq!(path.component(2).unwrap(), "baz");
        assert!(matches!(
            path.component(3),
            Err(FsError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_slice_last_components() {
        let path = Path::new("/foo/bar/car/goo.txt");
        let len = path.len();
        assert_eq!(path.slice(len - 2..).unwrap(), "car/goo.txt");
        assert_eq!(path.slice(len - 1..).unwrap(), "goo.txt");
        assert_eq!(path.slice(len - 3..).unwrap(), "bar/car/goo.txt");
    }

    #[test]
    fn test_slice_from_start_keeps_absolute_prefix() {
        let path = Path::new("/foo/bar/car");
        assert_eq!(path.slice(..2).unwrap(), "/foo/bar");
        assert_eq!(path.slice(0..1).unwrap(), "/foo");
        assert_eq!(path.slice(..).unwrap(), "/foo/bar/car");
        assert_eq!(Path::new("foo/bar").slice(..1).unwrap(), "foo");
        assert_eq!(path.slice(..0).unwrap(), "");
    }

    #[test]
    fn test_slice_out_of_range() {
        let path = Path::new("/foo/bar");
        assert!(matches!(
            path.slice(1..5),
            Err(FsError::SliceOutOfRange { start: 1, end: 5, len: 2 })
        ));
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = path.slice(2..1);
        assert!(reversed.is_err());
    }

    #[test]
    fn test_set_component() {
        let mut path = Path::new("/foo/bar/baz");
        path.set_component(1, "qux").unwrap();
        assert_eq!(path, "/foo/qux/baz");
        assert_eq!(path.component(1).unwrap(), "qux");
        assert!(path.is_absolute());

        path.set_component(0, "root").unwrap();
        assert_eq!(path, "/root/qux/baz");

        let mut relative = Path::new("foo/bar");
        relative.set_component(1, "baz").unwrap();
        assert_eq!(relative, "foo/baz");
        assert!(!relative.is_absolute());
    }

    #[test]
    fn test_set_component_round_trips_for_every_index() {
        for original in ["/a/b/c/d", "a/b/c/d", "/single", "x"] {
            let path = Path::new(original);
            for i in 0..path.len() {
                let replaced = path.with_component_replaced(i, "new").unwrap();
                assert_eq!(replaced.component(i).unwrap(), "new");
                assert_eq!(replaced.is_absolute(), path.is_absolute());
            }
        }
    }

    #[test]
    fn test_set_component_reapplies_prefix_unconditionally() {
        let mut path = Path::new("/foo/bar");
        path.set_component(0, "/etc").unwrap();
        assert_eq!(path, "//etc/bar");
        assert!(path.is_absolute());
    }

    #[test]
    fn test_set_component_out_of_range() {
        let mut path = Path::new("/foo");
        assert!(path.set_component(1, "bar").is_err());
        assert_eq!(path, "/foo");
    }

    #[test]
    fn test_contains_aligns_to_components() {
        let path = Path::new("/foo/bar/baz");
        assert!(path.contains("bar"));
        assert!(path.contains("foo"));
        assert!(path.contains("baz"));
        assert!(path.contains("bar/baz"));
        assert!(path.contains("/foo"));
        assert!(path.contains("bar/"));
        assert!(!path.contains("ba"));
        assert!(!path.contains("ar"));
        assert!(!path.contains("/bar"));
        assert!(!path.contains(""));
    }

    #[test]
    fn test_contains_relative_start() {
        let path = Path::new("foo/bar");
        assert!(path.contains("foo"));
        assert!(!path.contains("fo"));
    }

    #[test]
    fn test_equality_with_strings() {
        let path = Path::new("/foo");
        assert_eq!(path, "/foo");
        assert_eq!(path, String::from("/foo"));
        assert_eq!("/foo", path);
        assert_eq!(path, Path::new("/foo"));
        assert_ne!(path, "/bar");
    }

    #[test]
    fn test_hash_matches_str() {
        let mut map = HashMap::new();
        map.insert(Path::new("/foo"), 1);
        assert_eq!(map.get("/foo"), Some(&1));
        assert_eq!(map.get(&Path::new("/foo")), Some(&1));
    }

    #[test]
    fn test_join_and_push() {
        let path = Path::new("/foo");
        assert_eq!(path.join("bar"), "/foo/bar");
        assert_eq!(path, "/foo");

        let mut path = Path::new("foo");
        path.push("bar");
        path.push("baz.txt");
        assert_eq!(path, "foo/bar/baz.txt");
    }

    #[test]
    fn test_prefixed_with() {
        let path = Path::new("bar/baz");
        assert_eq!(path.prefixed_with("/foo"), "/foo/bar/baz");
        assert_eq!(path.prefixed_with("foo/"), "foo/bar/baz");
        assert_eq!(Path::new("/bar").prefixed_with("foo"), "foo/bar");
    }

    #[test]
    fn test_scoped_open() {
        let temp = TempDir::new().unwrap();
        let path = Path::new(temp.path().join("note.txt").to_string_lossy().into_owned());
        assert!(!path.exists());

        path.with_open(OpenMode::Write, |fh| Ok(fh.write_all(b"hello")?))
            .unwrap();
        assert!(path.exists());

        let mut content = String::new();
        path.reader().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello");

        let failed: Result<()> = path.with_open(OpenMode::Append, |fh| {
            fh.write_all(b" world")?;
            Err(FsError::InvalidMode("bail".into()))
        });
        assert!(matches!(failed, Err(FsError::InvalidMode(_))));

        let err = Path::new(temp.path().join("absent").to_string_lossy().into_owned())
            .reader()
            .unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        let content = std::fs::read_to_string(path.as_str()).unwrap();
        assert_eq!(content, "hello world");
    }
}
