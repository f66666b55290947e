//! Error types for the write engine.

use std::io;
use std::path::{Path, PathBuf};

use metadata::MetadataError;
use tokio::task;

/// Result type for write operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Error reported when a file cannot be materialized.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// A filesystem request failed.
    #[error("failed to {context} '{}': {source}", .path.display())]
    Io {
        /// Operation that was being performed.
        context: &'static str,
        /// Path the operation targeted.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading the content stream failed.
    #[error("failed to read contents for '{}': {source}", .path.display())]
    Source {
        /// Destination the stream was being written to.
        path: PathBuf,
        /// The error raised by the stream.
        #[source]
        source: io::Error,
    },

    /// Metadata reconciliation failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The output folder resolved to an empty path.
    #[error("invalid output folder for '{}'", .0.display())]
    InvalidOutputFolder(PathBuf),

    /// A spawned write task panicked or was cancelled.
    #[error("write task failed: {0}")]
    Join(#[from] task::JoinError),
}

impl WriteError {
    /// Creates an I/O error with operation and path context.
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Creates a content stream error.
    pub fn source(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Source {
            path: path.into(),
            source,
        }
    }

    /// Path involved in the failure, when known.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } | Self::Source { path, .. } | Self::InvalidOutputFolder(path) => {
                Some(path)
            }
            Self::Metadata(error) => Some(error.path()),
            Self::Join(_) => None,
        }
    }

    /// Underlying I/O error, when the failure came from one.
    #[must_use]
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::Io { source, .. } | Self::Source { source, .. } => Some(source),
            Self::Metadata(error) => Some(error.source_error()),
            Self::InvalidOutputFolder(_) | Self::Join(_) => None,
        }
    }

    /// OS error code, when the failure came from a syscall.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().and_then(io::Error::raw_os_error)
    }

    /// Reports whether the target already existed.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::AlreadyExists)
    }
}

/// Extension trait for mapping I/O results to [`WriteError`] with context.
pub(crate) trait IoResultExt<T> {
    /// Maps an I/O error to [`WriteError::Io`].
    fn with_path(self, context: &'static str, path: &Path) -> WriteResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, context: &'static str, path: &Path) -> WriteResult<T> {
        self.map_err(|error| WriteError::io(context, path, error))
    }
}

/// Combines a primary outcome with a cleanup outcome.
///
/// The primary error always wins. A cleanup error is reported only when the
/// primary step succeeded; otherwise it is logged and dropped.
pub(crate) fn settle<T>(primary: WriteResult<T>, cleanup: WriteResult<()>) -> WriteResult<T> {
    match (primary, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(error)) | (Err(error), Ok(())) => Err(error),
        (Err(error), Err(suppressed)) => {
            crate::debug_write::trace_cleanup_suppressed(&suppressed);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display_names_context_and_path() {
        let error = WriteError::io(
            "open destination",
            "/out/a.txt",
            io::Error::new(io::ErrorKind::NotFound, "not found"),
        );
        let display = error.to_string();
        assert!(display.contains("open destination"));
        assert!(display.contains("/out/a.txt"));
        assert_eq!(error.path(), Some(Path::new("/out/a.txt")));
    }

    #[test]
    fn raw_os_error_is_exposed() {
        let error = WriteError::io("create", "/x", io::Error::from_raw_os_error(17));
        assert_eq!(error.raw_os_error(), Some(17));
    }

    #[test]
    fn already_exists_is_detected_only_for_io() {
        let exists = WriteError::io("open", "/x", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(exists.is_already_exists());

        let source = WriteError::source("/x", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(!source.is_already_exists());
    }

    #[test]
    fn settle_prefers_primary_error() {
        let primary: WriteResult<()> = Err(WriteError::io(
            "write contents",
            "/x",
            io::Error::from(io::ErrorKind::WriteZero),
        ));
        let cleanup = Err(WriteError::io(
            "close destination",
            "/x",
            io::Error::from(io::ErrorKind::Other),
        ));
        let error = settle(primary, cleanup).expect_err("primary fails");
        assert_eq!(
            error.io_error().map(io::Error::kind),
            Some(io::ErrorKind::WriteZero)
        );
    }

    #[test]
    fn settle_reports_cleanup_after_success() {
        let cleanup = Err(WriteError::io(
            "close destination",
            "/x",
            io::Error::from(io::ErrorKind::Other),
        ));
        let error = settle(Ok(5), cleanup).expect_err("close fails");
        assert!(error.to_string().contains("close destination"));
        assert_eq!(settle(Ok(5), Ok(())).expect("clean"), 5);
    }
}
