//! Syscall-recording [`DescriptorOps`] for tests.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use filetime::FileTime;
use vfile::DiskStat;

use crate::ops::{DescriptorOps, SystemOps};

/// Kind of descriptor syscall.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// `fstat`.
    Stat,
    /// `fchmod`.
    Chmod,
    /// `futimens`.
    SetTimes,
    /// `fchown`.
    Chown,
    /// Opening a directory for reconciliation.
    OpenDirectory,
}

/// One recorded syscall with its arguments.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Call {
    /// `fstat`.
    Stat,
    /// `fchmod` with the requested mode.
    Chmod {
        /// Requested mode.
        mode: u32,
    },
    /// `futimens` with the requested times.
    SetTimes {
        /// Requested access time.
        atime: FileTime,
        /// Requested modification time.
        mtime: FileTime,
    },
    /// `fchown` with the requested ids.
    Chown {
        /// Requested user id.
        uid: u32,
        /// Requested group id.
        gid: u32,
    },
    /// Opening a directory for reconciliation.
    OpenDirectory,
}

impl Call {
    /// Kind of this call.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Stat => Operation::Stat,
            Self::Chmod { .. } => Operation::Chmod,
            Self::SetTimes { .. } => Operation::SetTimes,
            Self::Chown { .. } => Operation::Chown,
            Self::OpenDirectory => Operation::OpenDirectory,
        }
    }
}

/// [`DescriptorOps`] that records every call before forwarding it to
/// [`SystemOps`].
///
/// Individual operations can be made to fail, or to succeed without touching
/// the file, and the observed stat and effective uid can be replaced.
#[derive(Debug, Default)]
pub struct RecordingOps {
    calls: Mutex<Vec<Call>>,
    failing: HashSet<Operation>,
    pretending: HashSet<Operation>,
    disk_stat: Option<DiskStat>,
    effective_uid: Option<Option<u32>>,
}

impl RecordingOps {
    /// Creates a recorder that forwards every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `operation` fail with `EPERM`.
    ///
    /// Off unix the error only carries [`io::ErrorKind::PermissionDenied`].
    #[must_use]
    pub fn fail(mut self, operation: Operation) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Makes `operation` succeed without issuing the syscall.
    ///
    /// Has no effect on [`Operation::OpenDirectory`], which must produce a
    /// descriptor.
    #[must_use]
    pub fn pretend(mut self, operation: Operation) -> Self {
        self.pretending.insert(operation);
        self
    }

    /// Reports `stat` for every `fstat`.
    #[must_use]
    pub fn with_disk_stat(mut self, stat: DiskStat) -> Self {
        self.disk_stat = Some(stat);
        self
    }

    /// Reports `uid` as the effective user id.
    #[must_use]
    pub fn with_effective_uid(mut self, uid: Option<u32>) -> Self {
        self.effective_uid = Some(uid);
        self
    }

    /// Calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Number of recorded calls of `operation`.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Call>> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn record(&self, call: Call) -> Option<io::Result<()>> {
        self.lock().push(call);
        let operation = call.operation();
        if self.failing.contains(&operation) {
            return Some(Err(permission_denied()));
        }
        if self.pretending.contains(&operation) {
            return Some(Ok(()));
        }
        None
    }
}

impl DescriptorOps for RecordingOps {
    fn stat(&self, file: &File) -> io::Result<DiskStat> {
        if let Some(outcome) = self.record(Call::Stat) {
            outcome?;
        }
        match self.disk_stat {
            Some(stat) => Ok(stat),
            None => SystemOps.stat(file),
        }
    }

    fn chmod(&self, file: &File, mode: u32) -> io::Result<()> {
        self.record(Call::Chmod { mode })
            .unwrap_or_else(|| SystemOps.chmod(file, mode))
    }

    fn set_times(&self, file: &File, atime: FileTime, mtime: FileTime) -> io::Result<()> {
        self.record(Call::SetTimes { atime, mtime })
            .unwrap_or_else(|| SystemOps.set_times(file, atime, mtime))
    }

    fn chown(&self, file: &File, uid: u32, gid: u32) -> io::Result<()> {
        self.record(Call::Chown { uid, gid })
            .unwrap_or_else(|| SystemOps.chown(file, uid, gid))
    }

    fn effective_uid(&self) -> Option<u32> {
        self.effective_uid
            .unwrap_or_else(|| SystemOps.effective_uid())
    }

    fn open_directory(&self, path: &Path) -> io::Result<File> {
        if let Some(outcome) = self.record(Call::OpenDirectory) {
            outcome?;
        }
        SystemOps.open_directory(path)
    }
}

#[cfg(unix)]
fn permission_denied() -> io::Error {
    io::Error::from_raw_os_error(rustix::io::Errno::PERM.raw_os_error())
}

#[cfg(not(unix))]
fn permission_denied() -> io::Error {
    io::Error::from(io::ErrorKind::PermissionDenied)
}
