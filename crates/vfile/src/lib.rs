//! # Overview
//!
//! `vfile` defines the in-memory description of a filesystem entry that the
//! vfdest engine materializes: where it goes ([`VirtualFile`]), what it holds
//! ([`Contents`]) and which metadata it should end up with ([`FileStat`]).
//!
//! # Invariants
//!
//! - A file holds exactly one [`Contents`] variant. A stream is moved out of
//!   the file when it is written, so it is consumed at most once.
//! - [`FileStat`] fields are optional: an unset field means "leave whatever the
//!   filesystem produces". After a write the engine overwrites the stat with
//!   the [`DiskStat`] it observed and then records each change it applied.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod contents;
mod file;
mod stat;

pub use contents::{ContentStream, Contents};
pub use file::VirtualFile;
pub use stat::{DiskStat, FileKind, FileStat, PERMISSION_MASK, is_valid_time};
