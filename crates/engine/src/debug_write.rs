//! Structured tracing for write and reconciliation decisions.
//!
//! All tracing is compiled behind the `tracing` feature flag and collapses to
//! inline no-ops when the feature is disabled.

use std::path::Path;

use metadata::ReconcileReport;

use crate::error::WriteError;
use crate::options::WriteFlag;

/// Target name for tracing events.
const WRITE_TARGET: &str = "vfdest::write";

// ============================================================================
// Tracing functions (feature-gated)
// ============================================================================

/// Traces the start of a write.
///
/// # Arguments
///
/// * `path` - Resolved destination path
/// * `kind` - Which content writer handles the file
/// * `flag` - Open flag resolved for the file
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_write_start(path: &Path, kind: &'static str, flag: WriteFlag) {
    tracing::debug!(
        target: WRITE_TARGET,
        path = %path.display(),
        kind = kind,
        flag = %flag,
        "write: starting"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_write_start(_path: &Path, _kind: &'static str, _flag: WriteFlag) {}

/// Traces a finished write.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_write_complete(path: &Path) {
    tracing::debug!(target: WRITE_TARGET, path = %path.display(), "write: complete");
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_write_complete(_path: &Path) {}

/// Traces a write skipped because the destination already existed and
/// overwriting was disabled.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_write_collision(path: &Path) {
    tracing::info!(
        target: WRITE_TARGET,
        path = %path.display(),
        "write: destination exists, leaving it untouched"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_write_collision(_path: &Path) {}

/// Traces a directory that another writer created first.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_directory_exists(path: &Path) {
    tracing::trace!(target: WRITE_TARGET, path = %path.display(), "mkdir: already exists");
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_directory_exists(_path: &Path) {}

/// Traces a directory whose metadata cannot be reconciled because it cannot
/// be opened.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_directory_unreadable(path: &Path) {
    tracing::debug!(
        target: WRITE_TARGET,
        path = %path.display(),
        "directory: not readable, skipping metadata"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_directory_unreadable(_path: &Path) {}

/// Traces the bytes pumped from a content stream.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_stream_complete(path: &Path, bytes: u64) {
    tracing::debug!(
        target: WRITE_TARGET,
        path = %path.display(),
        bytes = bytes,
        "stream: drained"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_stream_complete(_path: &Path, _bytes: u64) {}

/// Traces the outcome of metadata reconciliation.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_reconciled(path: &Path, report: &ReconcileReport) {
    if report.skipped_unprivileged() {
        tracing::info!(
            target: WRITE_TARGET,
            path = %path.display(),
            "reconcile: not owner, metadata left as is"
        );
        return;
    }
    tracing::trace!(
        target: WRITE_TARGET,
        path = %path.display(),
        mode = report.mode_applied(),
        times = report.times_applied(),
        owner = report.owner_applied(),
        "reconcile: applied"
    );
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_reconciled(_path: &Path, _report: &ReconcileReport) {}

/// Traces a cleanup failure hidden by an earlier error.
#[cfg(feature = "tracing")]
#[inline]
pub fn trace_cleanup_suppressed(error: &WriteError) {
    tracing::warn!(target: WRITE_TARGET, error = %error, "cleanup failed after earlier error");
}

/// No-op when tracing is disabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn trace_cleanup_suppressed(_error: &WriteError) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn tracing_functions_do_not_panic_without_subscriber() {
        let path = Path::new("/out/a.txt");
        trace_write_start(path, "buffer", WriteFlag::new(true, false));
        trace_write_complete(path);
        trace_write_collision(path);
        trace_directory_exists(path);
        trace_directory_unreadable(path);
        trace_stream_complete(path, 42);
        trace_reconciled(path, &ReconcileReport::default());
        trace_cleanup_suppressed(&WriteError::io(
            "close destination",
            path,
            io::Error::from(io::ErrorKind::Other),
        ));
    }
}
