use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Step of a reconciliation that can fail.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReconcileStep {
    /// Opening the destination when no descriptor was supplied.
    Open,
    /// `fstat` of the descriptor.
    Inspect,
    /// `fchmod`.
    Permissions,
    /// `futimens`.
    Timestamps,
    /// `fchown`.
    Ownership,
    /// Closing a descriptor opened for the reconciliation.
    Close,
}

impl ReconcileStep {
    /// Action phrase used in messages, e.g. `"update permissions"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open destination",
            Self::Inspect => "inspect destination",
            Self::Permissions => "update permissions",
            Self::Timestamps => "update timestamps",
            Self::Ownership => "update ownership",
            Self::Close => "close destination",
        }
    }

    /// Reports whether the step changes the file rather than observing it.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(self, Self::Permissions | Self::Timestamps | Self::Ownership)
    }
}

impl fmt::Display for ReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reconciliation step failed on a written file.
///
/// Carries the failing [`ReconcileStep`], the destination path and the
/// syscall error.
#[derive(Debug)]
pub struct MetadataError {
    step: ReconcileStep,
    path: PathBuf,
    source: io::Error,
}

impl MetadataError {
    pub(crate) fn new(step: ReconcileStep, path: &Path, source: io::Error) -> Self {
        Self {
            step,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Step that failed.
    #[must_use]
    pub const fn step(&self) -> ReconcileStep {
        self.step
    }

    /// Action phrase of the failed step.
    #[must_use]
    pub const fn context(&self) -> &'static str {
        self.step.as_str()
    }

    /// Destination being reconciled.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syscall error behind the failure.
    #[must_use]
    pub fn source_error(&self) -> &io::Error {
        &self.source
    }

    /// OS error code, when the syscall reported one.
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.raw_os_error()
    }

    /// Splits the error into step, path and syscall error.
    #[must_use]
    pub fn into_parts(self) -> (ReconcileStep, PathBuf, io::Error) {
        (self.step, self.path, self.source)
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to {} '{}': {}", self.step, self.path.display(), self.source)
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_step_and_path() {
        let error = MetadataError::new(
            ReconcileStep::Permissions,
            Path::new("/out/a.txt"),
            io::Error::from_raw_os_error(1),
        );
        let rendered = error.to_string();
        assert!(rendered.starts_with("failed to update permissions '/out/a.txt': "));
        assert_eq!(error.raw_os_error(), Some(1));
        assert_eq!(error.context(), "update permissions");
    }

    #[test]
    fn only_syscalls_that_change_the_file_are_mutations() {
        assert!(ReconcileStep::Timestamps.is_mutation());
        assert!(ReconcileStep::Ownership.is_mutation());
        assert!(!ReconcileStep::Inspect.is_mutation());
        assert!(!ReconcileStep::Close.is_mutation());
    }

    #[test]
    fn into_parts_returns_components() {
        let error = MetadataError::new(
            ReconcileStep::Inspect,
            Path::new("x"),
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        let (step, path, source) = error.into_parts();
        assert_eq!(step, ReconcileStep::Inspect);
        assert_eq!(path, PathBuf::from("x"));
        assert_eq!(source.kind(), io::ErrorKind::NotFound);
    }
}
