use std::fs::File;
use std::path::Path;

use vfile::FileStat;

use crate::diff::MetadataDiff;
use crate::error::{MetadataError, ReconcileStep};
use crate::ops::DescriptorOps;

/// Outcome of a successful [`reconcile`] call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileReport {
    diff: MetadataDiff,
    unprivileged: bool,
    mode_applied: bool,
    times_applied: bool,
    owner_applied: bool,
}

impl ReconcileReport {
    /// Changes that were needed.
    #[must_use]
    pub const fn diff(&self) -> &MetadataDiff {
        &self.diff
    }

    /// Reports whether pending changes were dropped because the process
    /// neither owns the file nor runs as the superuser.
    #[must_use]
    pub const fn skipped_unprivileged(&self) -> bool {
        self.unprivileged
    }

    /// Reports whether the permission bits were changed.
    #[must_use]
    pub const fn mode_applied(&self) -> bool {
        self.mode_applied
    }

    /// Reports whether the timestamps were changed.
    #[must_use]
    pub const fn times_applied(&self) -> bool {
        self.times_applied
    }

    /// Reports whether the owner was changed.
    #[must_use]
    pub const fn owner_applied(&self) -> bool {
        self.owner_applied
    }
}

/// Brings the metadata of the open `file` in line with `stat`.
///
/// `stat` holds the desired values on entry. It is first overwritten with
/// what `fstat` reports and then updated field by field as each change
/// succeeds, so on return it always describes the file as it is on disk.
///
/// Changes are applied in a fixed order: permission bits, then timestamps,
/// then owner. Every applicable step is attempted even when an earlier one
/// fails; the first failure is the one returned.
///
/// When changes are needed but the effective user neither owns the file nor
/// is the superuser, nothing is applied and the call succeeds with
/// [`ReconcileReport::skipped_unprivileged`] set.
pub fn reconcile<O>(
    ops: &O,
    file: &File,
    path: &Path,
    stat: &mut FileStat,
) -> Result<ReconcileReport, MetadataError>
where
    O: DescriptorOps + ?Sized,
{
    let actual = ops
        .stat(file)
        .map_err(|error| MetadataError::new(ReconcileStep::Inspect, path, error))?;

    let diff = MetadataDiff::compute(&actual, stat);
    stat.mirror(&actual);

    let mut report = ReconcileReport {
        diff,
        ..ReconcileReport::default()
    };
    if diff.is_empty() {
        return Ok(report);
    }

    if !may_modify(ops.effective_uid(), actual.uid) {
        report.unprivileged = true;
        return Ok(report);
    }

    let mut first_error: Option<MetadataError> = None;
    let failed =
        |step: ReconcileStep, error: std::io::Error| MetadataError::new(step, path, error);

    if diff.mode != 0 {
        let mode = actual.mode ^ diff.mode;
        match ops.chmod(file, mode) {
            Ok(()) => {
                stat.mode = Some(mode);
                report.mode_applied = true;
            }
            Err(error) => {
                first_error.get_or_insert(failed(ReconcileStep::Permissions, error));
            }
        }
    }

    if let Some(times) = diff.times {
        match ops.set_times(file, times.atime, times.mtime) {
            Ok(()) => {
                stat.atime = Some(times.atime);
                stat.mtime = Some(times.mtime);
                report.times_applied = true;
            }
            Err(error) => {
                first_error.get_or_insert(failed(ReconcileStep::Timestamps, error));
            }
        }
    }

    if let Some(owner) = diff.owner {
        match ops.chown(file, owner.uid, owner.gid) {
            Ok(()) => {
                stat.uid = Some(owner.uid);
                stat.gid = Some(owner.gid);
                report.owner_applied = true;
            }
            Err(error) => {
                first_error.get_or_insert(failed(ReconcileStep::Ownership, error));
            }
        }
    }

    first_error.map_or(Ok(report), Err)
}

/// Opens `path` read-only and reconciles through the resulting descriptor.
///
/// The descriptor is closed before returning. A close failure is reported
/// only when reconciliation itself succeeded.
pub fn reconcile_path<O>(
    ops: &O,
    path: &Path,
    stat: &mut FileStat,
) -> Result<ReconcileReport, MetadataError>
where
    O: DescriptorOps + ?Sized,
{
    let file =
        File::open(path).map_err(|error| MetadataError::new(ReconcileStep::Open, path, error))?;
    let result = reconcile(ops, &file, path, stat);
    let closed = platform::close_file(file)
        .map_err(|error| MetadataError::new(ReconcileStep::Close, path, error));
    let report = result?;
    closed?;
    Ok(report)
}

fn may_modify(effective_uid: Option<u32>, owner: u32) -> bool {
    effective_uid.is_some_and(|uid| uid == owner || platform::is_superuser(uid))
}
