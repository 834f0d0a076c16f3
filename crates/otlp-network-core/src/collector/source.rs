//! Metrics Source: fresh reads of files below the proc mount point.

use std::io;
use std::path::{Path, PathBuf};

use crate::collector::procfs::ParseError;
use crate::collector::traits::FileSystem;
use crate::error::{CollectError, SetupError};

/// Reads files relative to a proc mount point through a [`FileSystem`].
///
/// Holds no state besides the filesystem handle and the root, so one source
/// can be shared by every collector and read concurrently.
#[derive(Debug, Clone)]
pub struct ProcSource<F: FileSystem> {
    fs: F,
    root: PathBuf,
}

impl<F: FileSystem> ProcSource<F> {
    /// Creates a source rooted at `root`.
    ///
    /// The mount point is mandatory: a missing root is a setup error.
    pub fn new(fs: F, root: impl Into<PathBuf>) -> Result<Self, SetupError> {
        let root = root.into();
        if !fs.exists(&root) {
            return Err(SetupError::MissingMountPoint(root));
        }
        Ok(Self { fs, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative` under the mount point.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Reads `relative` now.
    ///
    /// Returns `Ok(None)` when the file does not exist, which collectors treat
    /// as an unavailable kernel feature rather than a failure.
    pub fn read(&self, relative: &str) -> Result<Option<String>, CollectError> {
        let path = self.path(relative);
        match self.fs.read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CollectError::Io { path, source }),
        }
    }

    /// Reads `relative` and runs `parse` over it.
    pub fn read_parsed<T>(
        &self,
        relative: &str,
        parse: impl FnOnce(&str) -> Result<T, ParseError>,
    ) -> Result<Option<T>, CollectError> {
        let Some(content) = self.read(relative)? else {
            return Ok(None);
        };
        parse(&content)
            .map(Some)
            .map_err(|source| CollectError::Malformed {
                path: self.path(relative),
                source,
            })
    }
}
