//! Symbolic link kinds, target rewriting and creation.

use std::io;
use std::path::{Component, Path, PathBuf};

use platform::Capabilities;

use crate::error::{WriteError, WriteResult};

/// How a link is created on platforms that type their links.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LinkKind {
    /// Link to a file, or an untyped POSIX symlink.
    File,
    /// Directory symlink.
    Dir,
    /// NTFS junction. The target is always stored as an absolute path.
    Junction,
}

impl LinkKind {
    /// Lowercase name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
            Self::Junction => "junction",
        }
    }
}

/// Facts about the link being written that decide its kind.
#[derive(Clone, Debug)]
pub struct LinkSite {
    /// Working directory relative targets are resolved against, the same one
    /// [`link_target`] rewrites from.
    pub cwd: PathBuf,
    /// Whether the file itself says it links to a directory. Used when the
    /// target does not exist.
    pub points_to_directory: bool,
}

/// Decides how a link to `target` is created.
///
/// Without typed links every link is [`LinkKind::File`]. Otherwise the target
/// is inspected: directories become [`LinkKind::Junction`] when
/// `use_junctions` is set and [`LinkKind::Dir`] when it is not. A missing
/// target falls back to [`LinkSite::points_to_directory`].
///
/// # Errors
///
/// Fails when the target exists but cannot be inspected.
pub async fn resolve_link_kind(
    site: &LinkSite,
    target: &Path,
    capabilities: Capabilities,
    use_junctions: bool,
) -> WriteResult<LinkKind> {
    if !capabilities.typed_links() {
        return Ok(LinkKind::File);
    }

    let resolved = site.cwd.join(target);
    let is_dir = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata.is_dir(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => site.points_to_directory,
        Err(error) => return Err(WriteError::io("inspect link target", resolved, error)),
    };

    Ok(match (is_dir, use_junctions) {
        (false, _) => LinkKind::File,
        (true, true) => LinkKind::Junction,
        (true, false) => LinkKind::Dir,
    })
}

/// Target stored in the link.
///
/// With `relative` set, the target is rewritten relative to `base`; relative
/// targets are first resolved against `cwd`. Junctions keep the target as
/// given.
#[must_use]
pub fn link_target(
    cwd: &Path,
    base: &Path,
    target: &Path,
    kind: LinkKind,
    relative: bool,
) -> PathBuf {
    if !relative || kind == LinkKind::Junction {
        return target.to_path_buf();
    }
    relative_path(base, &cwd.join(target))
}

/// Path that leads from directory `from` to `to`.
///
/// Both paths are normalized lexically before comparison. Identical paths
/// yield `.`.
#[must_use]
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);

    let common = from
        .components()
        .zip(to.components())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in from.components().skip(common) {
        relative.push("..");
    }
    for component in to.components().skip(common) {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Removes whatever occupies `path` so a link can take its place.
///
/// A missing entry is not an error.
pub(crate) async fn remove_existing(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        #[cfg(windows)]
        Err(error) => match tokio::fs::remove_dir(path).await {
            Ok(()) => Ok(()),
            Err(_) => Err(error),
        },
        #[cfg(not(windows))]
        Err(error) => Err(error),
    }
}

/// Creates a link at `path` pointing to `target`.
#[cfg(unix)]
pub(crate) async fn create_link(target: &Path, path: &Path, _kind: LinkKind) -> io::Result<()> {
    tokio::fs::symlink(target, path).await
}

/// Creates a link at `path` pointing to `target`.
#[cfg(windows)]
pub(crate) async fn create_link(target: &Path, path: &Path, kind: LinkKind) -> io::Result<()> {
    match kind {
        LinkKind::File => tokio::fs::symlink_file(target, path).await,
        LinkKind::Dir => tokio::fs::symlink_dir(target, path).await,
        LinkKind::Junction => {
            let target = target.to_path_buf();
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || junction::create(target, path))
                .await
                .map_err(io::Error::other)?
        }
    }
}

/// Creates a link at `path` pointing to `target`.
#[cfg(not(any(unix, windows)))]
pub(crate) async fn create_link(_target: &Path, _path: &Path, _kind: LinkKind) -> io::Result<()> {
    Err(io::Error::from(io::ErrorKind::Unsupported))
}
