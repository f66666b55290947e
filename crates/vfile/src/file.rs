use std::path::{Path, PathBuf};

use crate::contents::Contents;
use crate::stat::{FileKind, FileStat};

/// In-memory descriptor of a filesystem entry to be materialized.
///
/// A file is created by an enumerator with at least a relative path, handed
/// to the writer by value, and returned by value once written. The writer
/// fills in [`Self::cwd`], [`Self::base`] and [`Self::path`] and refreshes
/// [`Self::stat`].
#[derive(Debug, Default)]
pub struct VirtualFile {
    cwd: PathBuf,
    base: PathBuf,
    path: PathBuf,
    relative: PathBuf,
    contents: Contents,
    directory: bool,
    stat: FileStat,
}

impl VirtualFile {
    /// Creates a file identified by its path relative to the destination root.
    pub fn new(relative: impl Into<PathBuf>) -> Self {
        let relative = relative.into();
        Self {
            path: relative.clone(),
            relative,
            ..Self::default()
        }
    }

    /// Creates a file from a source `path` located under `base`.
    ///
    /// The relative path is `path` with `base` stripped; when `path` is not
    /// under `base` only its file name is kept.
    pub fn from_source(base: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let path = path.into();
        let relative = path.strip_prefix(&base).map_or_else(
            |_| path.file_name().map(PathBuf::from).unwrap_or_default(),
            Path::to_path_buf,
        );
        Self {
            base,
            path,
            relative,
            ..Self::default()
        }
    }

    /// Sets the contents.
    #[must_use]
    pub fn with_contents(mut self, contents: impl Into<Contents>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Makes the file a symbolic link to `target`.
    #[must_use]
    pub fn with_symlink(mut self, target: impl Into<PathBuf>) -> Self {
        self.contents = Contents::Symlink(target.into());
        self
    }

    /// Sets the desired metadata.
    #[must_use]
    pub fn with_stat(mut self, stat: FileStat) -> Self {
        self.stat = stat;
        self
    }

    /// Marks the file as a directory.
    #[must_use]
    pub fn as_directory(mut self) -> Self {
        self.directory = true;
        self.stat.kind = Some(FileKind::Directory);
        self
    }

    /// Working directory the destination was resolved against.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Destination root.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Destination path. Absolute once the file has been prepared.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to [`Self::base`].
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Parent directory of [`Self::path`].
    #[must_use]
    pub fn dirname(&self) -> Option<&Path> {
        self.path.parent().filter(|parent| !parent.as_os_str().is_empty())
    }

    /// Re-roots the file under `base`, resolved against `cwd`.
    pub fn relocate(&mut self, cwd: PathBuf, base: PathBuf) {
        let base = cwd.join(base);
        self.path = base.join(&self.relative);
        self.base = base;
        self.cwd = cwd;
    }

    /// Payload.
    #[must_use]
    pub fn contents(&self) -> &Contents {
        &self.contents
    }

    /// Replaces the payload.
    pub fn set_contents(&mut self, contents: Contents) {
        self.contents = contents;
    }

    /// Moves the payload out, leaving [`Contents::Empty`].
    pub fn take_contents(&mut self) -> Contents {
        std::mem::take(&mut self.contents)
    }

    /// Reports whether the file describes a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.directory
    }

    /// Reports whether the file describes a symbolic link.
    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        self.contents.is_symlink()
    }

    /// Metadata, desired before a write and observed after.
    #[must_use]
    pub fn stat(&self) -> &FileStat {
        &self.stat
    }

    /// Mutable access to the metadata.
    pub fn stat_mut(&mut self) -> &mut FileStat {
        &mut self.stat
    }
}
