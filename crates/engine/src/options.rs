//! Per-file write options.
//!
//! [`DestinationOptions`] holds the caller's configuration. Every setting is a
//! [`FileOption`]: either a fixed value or a function of the file being
//! written. [`DestinationOptions::resolve`] evaluates each setting once per
//! file and produces an immutable [`WriteOptions`] that the writers consume.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use platform::Capabilities;
use vfile::VirtualFile;

use crate::error::{IoResultExt, WriteError, WriteResult};

/// Resolver evaluated against the file being written.
pub type Resolver<T> = Arc<dyn Fn(&VirtualFile) -> T + Send + Sync>;

/// A setting given either as a value or as a function of the file.
pub enum FileOption<T> {
    /// Same value for every file.
    Value(T),
    /// Computed from each file.
    Resolver(Resolver<T>),
}

impl<T: Clone> FileOption<T> {
    /// Wraps a per-file function.
    pub fn from_fn<F>(resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> T + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(resolver))
    }

    /// Evaluates the setting for `file`.
    pub fn resolve(&self, file: &VirtualFile) -> T {
        match self {
            Self::Value(value) => value.clone(),
            Self::Resolver(resolver) => resolver(file),
        }
    }
}

impl<T: Clone> Clone for FileOption<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Resolver(resolver) => Self::Resolver(Arc::clone(resolver)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for FileOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl<T> From<T> for FileOption<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

/// How the destination is opened for regular file contents.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct WriteFlag {
    exclusive: bool,
    append: bool,
}

impl WriteFlag {
    /// Builds the flag from the `overwrite` and `append` settings.
    #[must_use]
    pub const fn new(overwrite: bool, append: bool) -> Self {
        Self {
            exclusive: !overwrite,
            append,
        }
    }

    /// Reports whether opening fails when the destination exists.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Reports whether writes go to the end of an existing file.
    #[must_use]
    pub const fn is_append(&self) -> bool {
        self.append
    }

    /// Short form: `w`, `wx`, `a` or `ax`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match (self.append, self.exclusive) {
            (false, false) => "w",
            (false, true) => "wx",
            (true, false) => "a",
            (true, true) => "ax",
        }
    }

    /// Open options for a regular file created with `mode`.
    ///
    /// `mode` is masked to its permission bits and is subject to the umask.
    /// When unset, the platform default is used.
    #[must_use]
    pub fn open_options(self, mode: Option<u32>) -> std::fs::OpenOptions {
        let mut options = std::fs::OpenOptions::new();
        options.write(true);
        if self.append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        if self.exclusive {
            options.create_new(true);
        } else {
            options.create(true);
        }
        #[cfg(unix)]
        if let Some(mode) = mode {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode & vfile::PERMISSION_MASK);
        }
        #[cfg(not(unix))]
        let _ = mode;
        options
    }
}

impl fmt::Display for WriteFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings resolved for one file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteOptions {
    cwd: PathBuf,
    base: PathBuf,
    mode: Option<u32>,
    dir_mode: Option<u32>,
    flag: WriteFlag,
    relative_symlinks: bool,
    use_junctions: bool,
}

impl WriteOptions {
    /// Absolute working directory.
    #[must_use]
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Absolute output folder the file is written under.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Mode for the written entry.
    #[must_use]
    pub const fn mode(&self) -> Option<u32> {
        self.mode
    }

    /// Mode for parent directories that have to be created.
    #[must_use]
    pub const fn dir_mode(&self) -> Option<u32> {
        self.dir_mode
    }

    /// Open flag for regular contents.
    #[must_use]
    pub const fn flag(&self) -> WriteFlag {
        self.flag
    }

    /// Reports whether symlink targets are rewritten relative to the base.
    #[must_use]
    pub const fn relative_symlinks(&self) -> bool {
        self.relative_symlinks
    }

    /// Reports whether directory links become junctions.
    #[must_use]
    pub const fn use_junctions(&self) -> bool {
        self.use_junctions
    }
}

/// Caller configuration for a [`Destination`](crate::Destination).
///
/// Unset settings take their defaults when resolved:
///
/// | Setting             | Default                                   |
/// |---------------------|-------------------------------------------|
/// | `cwd`               | process working directory                 |
/// | `mode`              | the file's own `stat.mode`                |
/// | `dir_mode`          | unset (platform default)                  |
/// | `overwrite`         | `true`                                    |
/// | `append`            | `false`                                   |
/// | `relative_symlinks` | `false`                                   |
/// | `use_junctions`     | [`Capabilities::junctions_by_default`]    |
#[derive(Clone, Debug)]
pub struct DestinationOptions {
    cwd: Option<FileOption<PathBuf>>,
    mode: Option<FileOption<Option<u32>>>,
    dir_mode: FileOption<Option<u32>>,
    overwrite: FileOption<bool>,
    append: FileOption<bool>,
    relative_symlinks: FileOption<bool>,
    use_junctions: Option<FileOption<bool>>,
}

impl Default for DestinationOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            mode: None,
            dir_mode: FileOption::Value(None),
            overwrite: FileOption::Value(true),
            append: FileOption::Value(false),
            relative_symlinks: FileOption::Value(false),
            use_junctions: None,
        }
    }
}

impl DestinationOptions {
    /// Creates options with every setting at its default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the working directory the output folder is resolved against.
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(FileOption::Value(cwd.into()));
        self
    }

    /// Computes the working directory per file.
    #[must_use]
    pub fn cwd_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> PathBuf + Send + Sync + 'static,
    {
        self.cwd = Some(FileOption::from_fn(resolver));
        self
    }

    /// Sets the mode for written entries.
    #[must_use]
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(FileOption::Value(Some(mode)));
        self
    }

    /// Computes the mode per file. Returning `None` leaves the mode to the
    /// platform default.
    #[must_use]
    pub fn mode_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> Option<u32> + Send + Sync + 'static,
    {
        self.mode = Some(FileOption::from_fn(resolver));
        self
    }

    /// Sets the mode for created parent directories.
    #[must_use]
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = FileOption::Value(Some(mode));
        self
    }

    /// Computes the parent directory mode per file.
    #[must_use]
    pub fn dir_mode_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> Option<u32> + Send + Sync + 'static,
    {
        self.dir_mode = FileOption::from_fn(resolver);
        self
    }

    /// Controls whether existing destinations are replaced.
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = FileOption::Value(overwrite);
        self
    }

    /// Decides per file whether an existing destination is replaced.
    #[must_use]
    pub fn overwrite_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> bool + Send + Sync + 'static,
    {
        self.overwrite = FileOption::from_fn(resolver);
        self
    }

    /// Controls whether contents are appended to an existing file.
    #[must_use]
    pub fn append(mut self, append: bool) -> Self {
        self.append = FileOption::Value(append);
        self
    }

    /// Decides per file whether contents are appended.
    #[must_use]
    pub fn append_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> bool + Send + Sync + 'static,
    {
        self.append = FileOption::from_fn(resolver);
        self
    }

    /// Controls whether symlink targets are rewritten relative to the output
    /// folder.
    #[must_use]
    pub fn relative_symlinks(mut self, relative: bool) -> Self {
        self.relative_symlinks = FileOption::Value(relative);
        self
    }

    /// Decides per file whether its symlink target is made relative.
    #[must_use]
    pub fn relative_symlinks_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> bool + Send + Sync + 'static,
    {
        self.relative_symlinks = FileOption::from_fn(resolver);
        self
    }

    /// Controls whether links to directories are created as junctions on
    /// platforms that type their links.
    #[must_use]
    pub fn use_junctions(mut self, junctions: bool) -> Self {
        self.use_junctions = Some(FileOption::Value(junctions));
        self
    }

    /// Decides per file whether a directory link becomes a junction.
    #[must_use]
    pub fn use_junctions_with<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&VirtualFile) -> bool + Send + Sync + 'static,
    {
        self.use_junctions = Some(FileOption::from_fn(resolver));
        self
    }

    /// Evaluates every setting for `file`.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::InvalidOutputFolder`] when `out_folder` resolves
    /// to an empty path, or an I/O error when the process working directory
    /// is needed and cannot be read.
    pub fn resolve(
        &self,
        out_folder: &FileOption<PathBuf>,
        file: &VirtualFile,
        capabilities: Capabilities,
    ) -> WriteResult<WriteOptions> {
        let out_folder = out_folder.resolve(file);
        if out_folder.as_os_str().is_empty() {
            return Err(WriteError::InvalidOutputFolder(file.relative().to_path_buf()));
        }

        let cwd = match &self.cwd {
            Some(cwd) => absolute(cwd.resolve(file))?,
            None => env::current_dir().with_path("read working directory", Path::new("."))?,
        };
        let base = cwd.join(out_folder);

        let mode = match &self.mode {
            Some(mode) => mode.resolve(file),
            None => file.stat().mode,
        };
        let use_junctions = match &self.use_junctions {
            Some(junctions) => junctions.resolve(file),
            None => capabilities.junctions_by_default(),
        };

        Ok(WriteOptions {
            cwd,
            base,
            mode,
            dir_mode: self.dir_mode.resolve(file),
            flag: WriteFlag::new(self.overwrite.resolve(file), self.append.resolve(file)),
            relative_symlinks: self.relative_symlinks.resolve(file),
            use_junctions,
        })
    }
}

fn absolute(path: PathBuf) -> WriteResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    std::path::absolute(&path).with_path("resolve working directory", &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfile::FileStat;

    fn resolve(options: &DestinationOptions, file: &VirtualFile) -> WriteOptions {
        options
            .resolve(
                &FileOption::Value(PathBuf::from("out")),
                file,
                Capabilities::posix(),
            )
            .expect("resolve")
    }

    #[test]
    fn defaults_follow_file_and_process() {
        let file = VirtualFile::new("a.txt").with_stat(FileStat::new().with_mode(0o100640));
        let options = resolve(&DestinationOptions::new(), &file);

        assert_eq!(options.cwd(), env::current_dir().expect("cwd"));
        assert_eq!(options.base(), options.cwd().join("out"));
        assert_eq!(options.mode(), Some(0o100640));
        assert_eq!(options.dir_mode(), None);
        assert_eq!(options.flag(), WriteFlag::new(true, false));
        assert!(!options.relative_symlinks());
        assert!(!options.use_junctions());
    }

    #[test]
    fn resolvers_see_the_file() {
        let file = VirtualFile::new("secret.key");
        let options = DestinationOptions::new()
            .cwd("/srv")
            .mode_with(|file| {
                file.relative()
                    .extension()
                    .is_some_and(|ext| ext == "key")
                    .then_some(0o600)
            })
            .overwrite_with(|file| file.relative() != Path::new("secret.key"));
        let resolved = resolve(&options, &file);

        assert_eq!(resolved.base(), Path::new("/srv/out"));
        assert_eq!(resolved.mode(), Some(0o600));
        assert!(resolved.flag().is_exclusive());
    }

    #[test]
    fn absolute_out_folder_ignores_cwd() {
        let file = VirtualFile::new("a.txt");
        let resolved = DestinationOptions::new()
            .cwd("/srv")
            .resolve(
                &FileOption::Value(PathBuf::from("/data/out")),
                &file,
                Capabilities::posix(),
            )
            .expect("resolve");
        assert_eq!(resolved.base(), Path::new("/data/out"));
    }

    #[test]
    fn empty_out_folder_is_rejected() {
        let file = VirtualFile::new("a.txt");
        let error = DestinationOptions::new()
            .resolve(
                &FileOption::from_fn(|_: &VirtualFile| PathBuf::new()),
                &file,
                Capabilities::posix(),
            )
            .expect_err("empty folder");
        assert!(matches!(error, WriteError::InvalidOutputFolder(_)));
    }

    #[test]
    fn junction_default_comes_from_capabilities() {
        let file = VirtualFile::new("link");
        let out = FileOption::Value(PathBuf::from("out"));
        let windows = DestinationOptions::new()
            .cwd("/srv")
            .resolve(&out, &file, Capabilities::windows())
            .expect("resolve");
        assert!(windows.use_junctions());

        let overridden = DestinationOptions::new()
            .cwd("/srv")
            .use_junctions(false)
            .resolve(&out, &file, Capabilities::windows())
            .expect("resolve");
        assert!(!overridden.use_junctions());
    }

    #[test]
    fn flag_short_forms() {
        assert_eq!(WriteFlag::new(true, false).as_str(), "w");
        assert_eq!(WriteFlag::new(false, false).as_str(), "wx");
        assert_eq!(WriteFlag::new(true, true).as_str(), "a");
        assert_eq!(WriteFlag::new(false, true).to_string(), "ax");
    }

    #[test]
    fn file_option_debug_hides_resolver() {
        let option: FileOption<bool> = FileOption::from_fn(|_| true);
        assert_eq!(format!("{option:?}"), "Resolver(..)");
        assert_eq!(format!("{:?}", FileOption::from(3_u32)), "Value(3)");
    }
}
