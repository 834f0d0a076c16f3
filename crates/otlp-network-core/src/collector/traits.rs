//! Abstractions for filesystem access to enable testing and mocking.
//!
//! The `FileSystem` trait allows the network collectors to read from the real
//! `/proc` filesystem on Linux and from in-memory fixtures in tests.

use std::io;
use std::path::Path;

/// Abstraction for filesystem operations.
///
/// Implementations must be shareable across threads: the same handle is read
/// concurrently by a scrape and a push tick.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    ///
    /// # Returns
    /// The file contents, or an I/O error. A missing file must surface as
    /// [`io::ErrorKind::NotFound`] so callers can tell absence from failure.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Real filesystem implementation that delegates to `std::fs`.
///
/// Use this in production to read from the actual `/proc` filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    /// Creates a new `RealFs` instance.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
