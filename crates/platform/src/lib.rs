//! Platform capability detection for the vfdest workspace.
//!
//! Everything that differs between operating systems when materializing files
//! lives behind this crate so the writer and the reconciler never branch on
//! `cfg` themselves:
//!
//! - [`Capabilities`] describes whether symbolic links carry a file/directory
//!   type, whether directory links default to junctions and whether POSIX
//!   ownership exists at all.
//! - [`effective_uid`] and [`is_superuser`] back the ownership check performed
//!   before metadata is mutated.
//! - [`close_file`] releases a descriptor and reports the `close(2)` result
//!   instead of discarding it like `Drop` does.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod capabilities;
mod descriptor;
mod identity;

pub use capabilities::Capabilities;
pub use descriptor::close_file;
pub use identity::{effective_uid, is_superuser};
