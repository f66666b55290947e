#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `metadata` reconciles the permission bits, timestamps and ownership of a
//! freshly written destination with the values its
//! [`VirtualFile`](vfile::VirtualFile) asks for, issuing only the syscalls
//! that are actually needed.
//!
//! # Design
//!
//! [`reconcile`] works on an open descriptor: it `fstat`s it, computes a
//! [`MetadataDiff`], checks that the process may change the file, and then
//! applies `fchmod`, `futimens` and `fchown` in that order. Each syscall goes
//! through [`DescriptorOps`], which makes the exact set of calls observable in
//! tests.
//!
//! # Invariants
//!
//! - The caller's [`FileStat`](vfile::FileStat) always ends up describing the
//!   file on disk: it is overwritten by the observed stat before any change is
//!   attempted and updated only for changes that succeeded.
//! - Lack of privilege is not an error; pending changes are dropped.
//! - Every applicable step is attempted even after an earlier failure; only the
//!   first failure is reported.
//!
//! # Examples
//!
//! ```no_run
//! use metadata::{SystemOps, reconcile_path};
//! use std::path::Path;
//! use vfile::FileStat;
//!
//! # fn example() -> Result<(), metadata::MetadataError> {
//! let mut stat = FileStat::new().with_mode(0o640);
//! let report = reconcile_path(&SystemOps, Path::new("/out/a.txt"), &mut stat)?;
//! assert!(report.mode_applied() || report.diff().mode == 0);
//! # Ok(())
//! # }
//! ```

mod diff;
mod error;
mod ops;
mod reconcile;

#[cfg(any(test, feature = "test-support"))]
pub mod recording;

pub use diff::{MetadataDiff, OwnerDiff, TimesDiff, mode_diff, owner_diff, times_diff};
pub use error::{MetadataError, ReconcileStep};
pub use ops::{DescriptorOps, SystemOps};
pub use reconcile::{ReconcileReport, reconcile, reconcile_path};

#[cfg(any(test, feature = "test-support"))]
pub use recording::{Call, Operation, RecordingOps};
