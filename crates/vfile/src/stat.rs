use std::fs;

use filetime::FileTime;

/// Permission bits that participate in mode reconciliation: owner, group and
/// other `rwx` plus setuid, setgid and sticky.
pub const PERMISSION_MASK: u32 = 0o7777;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Reports whether `time` denotes a representable instant.
///
/// A [`FileTime`] built from a raw `(seconds, nanoseconds)` pair is not
/// normalized, so a nanosecond field outside `0..1_000_000_000` marks a
/// timestamp that must never be handed to `futimens`.
#[must_use]
pub fn is_valid_time(time: FileTime) -> bool {
    time.nanoseconds() < NANOS_PER_SECOND
}

/// Coarse classification of a filesystem entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (or junction).
    Symlink,
    /// FIFO, socket or device node.
    Other,
}

impl FileKind {
    /// Classifies a [`fs::FileType`].
    #[must_use]
    pub fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Directory
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Metadata carried by a [`VirtualFile`](crate::VirtualFile).
///
/// Before a write the fields express desired values; after a write they
/// mirror the destination on disk.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FileStat {
    /// Mode bits. May include file type bits; only [`PERMISSION_MASK`] is
    /// reconciled.
    pub mode: Option<u32>,
    /// Last access time.
    pub atime: Option<FileTime>,
    /// Last modification time.
    pub mtime: Option<FileTime>,
    /// Owning user id.
    pub uid: Option<u32>,
    /// Owning group id.
    pub gid: Option<u32>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Entry classification.
    pub kind: Option<FileKind>,
}

impl FileStat {
    /// Creates an empty stat with every field unset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: None,
            atime: None,
            mtime: None,
            uid: None,
            gid: None,
            size: None,
            kind: None,
        }
    }

    /// Sets the desired mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets the desired modification and access times.
    #[must_use]
    pub const fn with_times(mut self, mtime: FileTime, atime: Option<FileTime>) -> Self {
        self.mtime = Some(mtime);
        self.atime = atime;
        self
    }

    /// Sets the desired owner. Either half may be left unset.
    #[must_use]
    pub const fn with_owner(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Sets the entry classification.
    #[must_use]
    pub const fn with_kind(mut self, kind: FileKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Overwrites every field with what was observed on disk.
    pub fn mirror(&mut self, disk: &DiskStat) {
        *self = Self::from(*disk);
    }

    /// Modification time, if set and valid.
    #[must_use]
    pub fn valid_mtime(&self) -> Option<FileTime> {
        self.mtime.filter(|time| is_valid_time(*time))
    }

    /// Access time, if set and valid.
    #[must_use]
    pub fn valid_atime(&self) -> Option<FileTime> {
        self.atime.filter(|time| is_valid_time(*time))
    }

    /// Reports whether the stat classifies the entry as a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind == Some(FileKind::Directory)
    }
}

impl From<DiskStat> for FileStat {
    fn from(disk: DiskStat) -> Self {
        Self {
            mode: Some(disk.mode),
            atime: Some(disk.atime),
            mtime: Some(disk.mtime),
            uid: Some(disk.uid),
            gid: Some(disk.gid),
            size: Some(disk.size),
            kind: Some(disk.kind),
        }
    }
}

/// Metadata observed on disk through a descriptor or `lstat`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DiskStat {
    /// Full mode including file type bits.
    pub mode: u32,
    /// Last access time.
    pub atime: FileTime,
    /// Last modification time.
    pub mtime: FileTime,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Size in bytes.
    pub size: u64,
    /// Entry classification.
    pub kind: FileKind,
}

impl DiskStat {
    /// Captures the fields relevant to reconciliation from `metadata`.
    #[must_use]
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let (mode, uid, gid) = owner_and_mode(metadata);
        Self {
            mode,
            atime: FileTime::from_last_access_time(metadata),
            mtime: FileTime::from_last_modification_time(metadata),
            uid,
            gid,
            size: metadata.len(),
            kind: FileKind::from_file_type(metadata.file_type()),
        }
    }

    /// Permission bits of [`Self::mode`].
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.mode & PERMISSION_MASK
    }
}

#[cfg(unix)]
fn owner_and_mode(metadata: &fs::Metadata) -> (u32, u32, u32) {
    use std::os::unix::fs::MetadataExt;

    (metadata.mode(), metadata.uid(), metadata.gid())
}

#[cfg(not(unix))]
fn owner_and_mode(metadata: &fs::Metadata) -> (u32, u32, u32) {
    let mut mode = if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    };
    if metadata.is_dir() {
        mode |= 0o111;
    }
    (mode, 0, 0)
}
