#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `engine` materializes [`VirtualFile`](vfile::VirtualFile)s on disk. A
//! [`Destination`] resolves per-file [`DestinationOptions`], re-roots each
//! file under its output folder, creates the parent directory and writes the
//! payload: a directory, a symbolic link, a stream or an in-memory buffer.
//! Metadata is then reconciled on the same descriptor through
//! [`metadata::reconcile`].
//!
//! # Design
//!
//! - [`ensure_dir`] creates directories recursively and treats a lost
//!   creation race as success.
//! - [`LazyFileWriter`] opens its destination on the first write and hands the
//!   descriptor to a hook before closing it.
//! - [`resolve_link_kind`] and [`link_target`] decide how links are created on
//!   platforms that type them.
//! - [`Destination::write_all`] and [`Destination::spawn_pipeline`] run many
//!   writes with bounded concurrency.
//!
//! # Invariants
//!
//! - Every descriptor is closed exactly once.
//! - With overwriting disabled an existing destination is never modified and
//!   the write still succeeds.
//! - A close failure never hides an earlier failure.
//!
//! # Features
//!
//! - `tracing` (default): emits structured events under the `vfdest::write`
//!   target.

mod contents;
mod debug_write;
mod descriptor;
mod destination;
mod error;
mod link;
mod mkdir;
mod options;
mod stream;

pub use destination::{Destination, MAX_CONCURRENT_ENV};
pub use error::{WriteError, WriteResult};
pub use link::{LinkKind, LinkSite, link_target, relative_path, resolve_link_kind};
pub use mkdir::ensure_dir;
pub use options::{DestinationOptions, FileOption, Resolver, WriteFlag, WriteOptions};
pub use stream::{
    FinishError, LazyFileReader, LazyFileWriter, PIPE_CHUNK_SIZE, PipeError, pipe,
};
