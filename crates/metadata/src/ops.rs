//! Descriptor-level syscalls used by the reconciler.
//!
//! [`DescriptorOps`] is the seam between the diff/apply logic and the
//! operating system. Production code uses [`SystemOps`]; tests substitute a
//! recording implementation to observe exactly which syscalls were issued.

use std::fs::File;
use std::io;
use std::path::Path;

use filetime::FileTime;
use vfile::DiskStat;

/// Syscalls the reconciler issues against an open descriptor.
pub trait DescriptorOps: Send + Sync {
    /// `fstat` the descriptor.
    fn stat(&self, file: &File) -> io::Result<DiskStat>;

    /// `fchmod` the descriptor. Only the permission bits of `mode` apply.
    fn chmod(&self, file: &File, mode: u32) -> io::Result<()>;

    /// `futimens` the descriptor.
    fn set_times(&self, file: &File, atime: FileTime, mtime: FileTime) -> io::Result<()>;

    /// `fchown` the descriptor.
    fn chown(&self, file: &File, uid: u32, gid: u32) -> io::Result<()>;

    /// Effective user id used for the ownership check.
    fn effective_uid(&self) -> Option<u32>;

    /// Opens the directory at `path` read-only so it can be reconciled
    /// through a descriptor.
    fn open_directory(&self, path: &Path) -> io::Result<File> {
        open_directory(path)
    }
}

#[cfg(not(windows))]
fn open_directory(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_directory(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;

    // FILE_FLAG_BACKUP_SEMANTICS
    File::options()
        .read(true)
        .custom_flags(0x0200_0000)
        .open(path)
}

/// [`DescriptorOps`] backed by the real operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemOps;

impl DescriptorOps for SystemOps {
    fn stat(&self, file: &File) -> io::Result<DiskStat> {
        file.metadata().map(|metadata| DiskStat::from_metadata(&metadata))
    }

    #[cfg(unix)]
    fn chmod(&self, file: &File, mode: u32) -> io::Result<()> {
        use rustix::fs::{Mode, RawMode, fchmod};

        let mode = Mode::from_raw_mode((mode & vfile::PERMISSION_MASK) as RawMode);
        fchmod(file, mode).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn chmod(&self, file: &File, mode: u32) -> io::Result<()> {
        let mut permissions = file.metadata()?.permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        file.set_permissions(permissions)
    }

    fn set_times(&self, file: &File, atime: FileTime, mtime: FileTime) -> io::Result<()> {
        filetime::set_file_handle_times(file, Some(atime), Some(mtime))
    }

    #[cfg(unix)]
    #[allow(unsafe_code)]
    fn chown(&self, file: &File, uid: u32, gid: u32) -> io::Result<()> {
        use rustix::fs::{Gid, Uid};
        use rustix::process::{RawGid, RawUid};

        // SAFETY: the ids are handed to fchown unchanged.
        let (owner, group) = unsafe {
            (
                Uid::from_raw(uid as RawUid),
                Gid::from_raw(gid as RawGid),
            )
        };
        rustix::fs::fchown(file, Some(owner), Some(group)).map_err(io::Error::from)
    }

    #[cfg(not(unix))]
    fn chown(&self, _file: &File, _uid: u32, _gid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "changing ownership is not supported on this platform",
        ))
    }

    fn effective_uid(&self) -> Option<u32> {
        platform::effective_uid()
    }
}
