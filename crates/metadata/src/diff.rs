//! Minimal differences between desired and observed metadata.

use filetime::FileTime;
use vfile::{DiskStat, FileStat, PERMISSION_MASK};

/// Timestamps to hand to `futimens`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimesDiff {
    /// Access time to apply.
    pub atime: FileTime,
    /// Modification time to apply.
    pub mtime: FileTime,
}

/// Owner to hand to `fchown`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OwnerDiff {
    /// User id to apply.
    pub uid: u32,
    /// Group id to apply.
    pub gid: u32,
}

/// Every change a destination needs to match its desired metadata.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MetadataDiff {
    /// Permission bits to flip; zero when nothing changes.
    pub mode: u32,
    /// Timestamps to set, if any.
    pub times: Option<TimesDiff>,
    /// Owner to set, if any.
    pub owner: Option<OwnerDiff>,
}

impl MetadataDiff {
    /// Computes the diff between `actual` and `desired`.
    #[must_use]
    pub fn compute(actual: &DiskStat, desired: &FileStat) -> Self {
        Self {
            mode: mode_diff(actual.mode, desired.mode),
            times: times_diff(actual, desired),
            owner: owner_diff(actual, desired),
        }
    }

    /// Reports whether no syscall is needed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mode == 0 && self.times.is_none() && self.owner.is_none()
    }
}

/// Permission bits that differ between `actual` and `desired`.
///
/// The result is masked to [`PERMISSION_MASK`], so file type bits carried by
/// either side never register as a difference. Zero when `desired` is unset.
#[must_use]
pub fn mode_diff(actual: u32, desired: Option<u32>) -> u32 {
    desired.map_or(0, |desired| (actual ^ desired) & PERMISSION_MASK)
}

/// Timestamps to apply, or `None` when the desired modification time is
/// invalid or both times already match.
///
/// An unset or invalid desired access time keeps the observed one.
#[must_use]
pub fn times_diff(actual: &DiskStat, desired: &FileStat) -> Option<TimesDiff> {
    let mtime = desired.valid_mtime()?;
    let atime = desired.valid_atime().unwrap_or(actual.atime);
    if mtime == actual.mtime && atime == actual.atime {
        return None;
    }
    Some(TimesDiff { atime, mtime })
}

/// Owner to apply, or `None` when neither id is set or both already match.
///
/// An unset half inherits the observed id rather than defaulting to zero.
#[must_use]
pub fn owner_diff(actual: &DiskStat, desired: &FileStat) -> Option<OwnerDiff> {
    if desired.uid.is_none() && desired.gid.is_none() {
        return None;
    }
    let uid = desired.uid.unwrap_or(actual.uid);
    let gid = desired.gid.unwrap_or(actual.gid);
    if uid == actual.uid && gid == actual.gid {
        return None;
    }
    Some(OwnerDiff { uid, gid })
}
