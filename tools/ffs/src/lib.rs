//! Pathname values and a small filesystem abstraction.
//!
//! [`Path`] is a string-backed pathname with component access. The
//! [`Filesystem`] trait describes a filesystem-like backend, with
//! [`DiskFilesystem`] proxying to the host OS. [`nix`] holds the OS-level
//! helpers the disk backend is built on.

pub mod filesystem;
pub mod nix;
pub mod path;
pub mod util;

pub mod mock;

pub use filesystem::{
    DirectoryGuard, DiskFilesystem, Filesystem, FsError, OpenMode, Result, Stat,
};
pub use nix::{mkdir_p, which};
pub use path::Path;
pub use util::{basen, hsize, lsmtime};
