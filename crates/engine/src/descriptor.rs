//! Descriptor hand-off between async writers and blocking metadata syscalls.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filetime::FileTime;
use metadata::{DescriptorOps, MetadataError, ReconcileReport, SystemOps};
use vfile::DiskStat;
use platform::Capabilities;
use tokio::task;
use vfile::FileStat;

use crate::debug_write::{trace_cleanup_suppressed, trace_reconciled};
use crate::error::{IoResultExt, WriteError, WriteResult, settle};

/// Shared collaborators every content writer needs.
#[derive(Clone)]
pub(crate) struct WriteContext {
    pub(crate) ops: Arc<dyn DescriptorOps>,
    pub(crate) capabilities: Capabilities,
}

impl WriteContext {
    pub(crate) fn new(ops: Arc<dyn DescriptorOps>, capabilities: Capabilities) -> Self {
        Self { ops, capabilities }
    }
}

impl Default for WriteContext {
    fn default() -> Self {
        Self::new(Arc::new(SystemOps), Capabilities::detect())
    }
}

impl fmt::Debug for WriteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteContext")
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Reconciles `desired` through `file`, then closes it.
///
/// Returns the stat observed after reconciliation. Both steps run on a
/// blocking thread; the descriptor is closed whatever reconciliation reports.
pub(crate) async fn reconcile_and_close(
    context: &WriteContext,
    file: File,
    path: PathBuf,
    desired: FileStat,
) -> WriteResult<FileStat> {
    let ops = Arc::clone(&context.ops);
    let capabilities = context.capabilities;
    let (reconciled, closed) = task::spawn_blocking(move || {
        let reconciled = reconcile_in_hook(&*ops, capabilities, &file, &path, desired)
            .map(|(stat, report)| (stat, report, path.clone()));
        let closed = platform::close_file(file).with_path("close destination", &path);
        (reconciled, closed)
    })
    .await?;

    let (stat, report, path) = settle(reconciled.map_err(WriteError::from), closed)?;
    trace_reconciled(&path, &report);
    Ok(stat)
}

/// Reconciles inside a hook that already owns the descriptor.
///
/// Without POSIX ownership the process never counts as the owner, so the
/// file is observed but left as it is.
pub(crate) fn reconcile_in_hook(
    ops: &dyn DescriptorOps,
    capabilities: Capabilities,
    file: &File,
    path: &Path,
    desired: FileStat,
) -> Result<(FileStat, ReconcileReport), MetadataError> {
    let mut stat = desired;
    let report = if capabilities.ownership() {
        metadata::reconcile(ops, file, path, &mut stat)?
    } else {
        metadata::reconcile(&ObserveOnly(ops), file, path, &mut stat)?
    };
    Ok((stat, report))
}

/// Forwards to the wrapped ops but reports no effective uid.
struct ObserveOnly<'a>(&'a dyn DescriptorOps);

impl DescriptorOps for ObserveOnly<'_> {
    fn stat(&self, file: &File) -> io::Result<DiskStat> {
        self.0.stat(file)
    }

    fn chmod(&self, file: &File, mode: u32) -> io::Result<()> {
        self.0.chmod(file, mode)
    }

    fn set_times(&self, file: &File, atime: FileTime, mtime: FileTime) -> io::Result<()> {
        self.0.set_times(file, atime, mtime)
    }

    fn chown(&self, file: &File, uid: u32, gid: u32) -> io::Result<()> {
        self.0.chown(file, uid, gid)
    }

    fn effective_uid(&self) -> Option<u32> {
        None
    }

    fn open_directory(&self, path: &Path) -> io::Result<File> {
        self.0.open_directory(path)
    }
}

/// Closes `file` after `error` already decided the outcome.
///
/// A close failure is logged and dropped.
pub(crate) async fn close_after_failure(file: File, path: &Path, error: WriteError) -> WriteError {
    let closed = match task::spawn_blocking(move || platform::close_file(file)).await {
        Ok(closed) => closed.with_path("close destination", path),
        Err(join) => Err(WriteError::from(join)),
    };
    if let Err(suppressed) = closed {
        trace_cleanup_suppressed(&suppressed);
    }
    error
}
