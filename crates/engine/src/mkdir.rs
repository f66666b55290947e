//! Recursive directory creation that tolerates concurrent creators.

use std::fs::Metadata;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;

use vfile::PERMISSION_MASK;

use crate::debug_write::trace_directory_exists;
use crate::error::{IoResultExt, WriteResult};

/// Ensures `path` exists as a directory.
///
/// Missing ancestors are created with the platform default mode. When `mode`
/// is given, `path` itself ends up with exactly those permission bits, whether
/// it was created here or already existed. Losing a creation race to another
/// writer is not an error.
///
/// # Errors
///
/// Fails when an entry that is not a directory occupies `path` or one of its
/// ancestors, or when creation or `chmod` fails for any other reason.
pub async fn ensure_dir(path: &Path, mode: Option<u32>) -> WriteResult<()> {
    create_dir(path, mode.map(|mode| mode & PERMISSION_MASK))
        .await
        .with_path("create directory", path)
}

type DirFuture<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

fn create_dir(path: &Path, mode: Option<u32>) -> DirFuture<'_> {
    Box::pin(async move {
        match make_dir(path, mode).await {
            Ok(()) => settle_existing(path, mode, None).await,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty())
                else {
                    return Err(error);
                };
                create_dir(parent, None).await?;
                create_dir(path, mode).await
            }
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                trace_directory_exists(path);
                settle_existing(path, mode, Some(error)).await
            }
            Err(error) => Err(error),
        }
    })
}

async fn make_dir(path: &Path, mode: Option<u32>) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    #[cfg(unix)]
    if let Some(mode) = mode {
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path).await
}

/// Checks that `path` is a directory and brings its mode in line with `mode`.
///
/// `collision` is the error that led here, returned unchanged when `path`
/// turns out not to be a directory.
async fn settle_existing(
    path: &Path,
    mode: Option<u32>,
    collision: Option<io::Error>,
) -> io::Result<()> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_dir() {
        return Err(collision.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists)));
    }
    match mode {
        Some(mode) if permissions(&metadata) != mode => set_mode(path, mode).await,
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn permissions(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & PERMISSION_MASK
}

#[cfg(not(unix))]
fn permissions(metadata: &Metadata) -> u32 {
    vfile::DiskStat::from_metadata(metadata).permissions()
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::TestDir;

    #[tokio::test]
    async fn creates_missing_ancestors() {
        let dir = TestDir::new().unwrap();
        let target = dir.join("a/b/c/d");

        ensure_dir(&target, None).await.unwrap();

        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn existing_directory_is_fine() {
        let dir = TestDir::new().unwrap();
        let target = dir.join("present");
        std::fs::create_dir(&target).unwrap();

        ensure_dir(&target, None).await.unwrap();
        ensure_dir(&target, None).await.unwrap();

        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn file_in_the_way_fails_with_original_error() {
        let dir = TestDir::new().unwrap();
        let target = dir.write_file("occupied", b"x").unwrap();

        let error = ensure_dir(&target, None).await.unwrap_err();

        assert!(error.is_already_exists());
        assert_eq!(error.path(), Some(target.as_path()));
    }

    #[tokio::test]
    async fn file_as_ancestor_fails() {
        let dir = TestDir::new().unwrap();
        dir.write_file("blocker", b"x").unwrap();

        let result = ensure_dir(&dir.join("blocker/child"), None).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn concurrent_creators_all_succeed() {
        let dir = TestDir::new().unwrap();
        let target = dir.join("shared/nested/leaf");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let target = target.clone();
            handles.push(tokio::spawn(
                async move { ensure_dir(&target, None).await },
            ));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(target.is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn existing_directory_gets_requested_mode() {
        let dir = TestDir::new().unwrap();
        let target = dir.join("loose");
        std::fs::create_dir(&target).unwrap();
        test_support::set_permissions(&target, 0o777).unwrap();

        ensure_dir(&target, Some(0o750)).await.unwrap();

        assert_eq!(test_support::permissions(&target).unwrap(), 0o750);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn created_directory_ignores_umask() {
        let dir = TestDir::new().unwrap();
        let target = dir.join("shared");

        ensure_dir(&target, Some(0o777)).await.unwrap();

        assert_eq!(test_support::permissions(&target).unwrap(), 0o777);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn type_bits_in_mode_are_ignored() {
        let dir = TestDir::new().unwrap();
        let target = dir.join("typed");

        ensure_dir(&target, Some(0o040755)).await.unwrap();

        assert_eq!(test_support::permissions(&target).unwrap(), 0o755);
    }
}
