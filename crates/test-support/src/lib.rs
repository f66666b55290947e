//! Shared filesystem fixtures for vfdest tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Scratch directory removed on drop.
#[derive(Debug)]
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates an empty scratch directory.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Root of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `relative` inside the scratch directory.
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Writes `contents` to `relative`, creating parent directories.
    pub fn write_file(&self, relative: impl AsRef<Path>, contents: &[u8]) -> io::Result<PathBuf> {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Reads `relative` back.
    pub fn read_file(&self, relative: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        fs::read(self.join(relative))
    }

    /// Reports whether `relative` exists without following symlinks.
    pub fn exists(&self, relative: impl AsRef<Path>) -> bool {
        fs::symlink_metadata(self.join(relative)).is_ok()
    }
}

/// Permission bits of `path` (mode masked to `0o7777`).
#[cfg(unix)]
pub fn permissions(path: impl AsRef<Path>) -> io::Result<u32> {
    use std::os::unix::fs::PermissionsExt;

    Ok(fs::metadata(path)?.permissions().mode() & 0o7777)
}

/// Sets the permission bits of `path`.
#[cfg(unix)]
pub fn set_permissions(path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_creates_and_cleans_up() {
        let path_copy;
        {
            let test_dir = TestDir::new().expect("create test dir");
            path_copy = test_dir.path().to_path_buf();
            assert!(path_copy.exists(), "test dir should exist");
        }
        assert!(!path_copy.exists(), "test dir should be cleaned up");
    }

    #[test]
    fn write_file_creates_parents() {
        let test_dir = TestDir::new().expect("create test dir");
        test_dir
            .write_file("nested/deeper/a.txt", b"hello")
            .expect("write file");
        assert!(test_dir.exists("nested/deeper"));
        assert_eq!(test_dir.read_file("nested/deeper/a.txt").unwrap(), b"hello");
    }
}
