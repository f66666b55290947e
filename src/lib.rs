#![deny(missing_docs)]

//! # Overview
//!
//! `vfdest` writes in-memory file descriptors to a destination directory.
//! Each [`VirtualFile`] carries a relative path, a payload (bytes, a stream, a
//! symbolic link target, or nothing) and the metadata it should end up with.
//! A [`Destination`] places it under an output folder, creates missing parent
//! directories and writes the payload. Permission bits, timestamps and owner
//! are then brought in line with the file's [`FileStat`], issuing only the
//! syscalls that are needed.
//!
//! The crates of the workspace are re-exported here:
//!
//! - [`vfile`]: the [`VirtualFile`] data model.
//! - [`metadata`]: descriptor-level metadata reconciliation.
//! - [`engine`]: directory creation, content writers and the write pipeline.
//! - [`platform`]: capability detection and descriptor helpers.
//!
//! # Examples
//!
//! ```no_run
//! use vfdest::{Destination, DestinationOptions, FileStat, VirtualFile};
//!
//! # async fn example() -> Result<(), vfdest::WriteError> {
//! let destination = Destination::new("build")
//!     .with_options(DestinationOptions::new().dir_mode(0o755));
//!
//! let file = VirtualFile::new("assets/app.css")
//!     .with_contents(b"body { margin: 0 }".to_vec())
//!     .with_stat(FileStat::new().with_mode(0o644));
//!
//! let written = destination.write(file).await?;
//! println!("wrote {}", written.path().display());
//! # Ok(())
//! # }
//! ```

pub use engine::{
    Destination, DestinationOptions, FileOption, LazyFileReader, LazyFileWriter, LinkKind,
    WriteError, WriteFlag, WriteOptions, WriteResult, ensure_dir,
};
pub use metadata::{
    DescriptorOps, MetadataError, ReconcileReport, ReconcileStep, SystemOps, reconcile,
};
pub use platform::Capabilities;
pub use vfile::{ContentStream, Contents, DiskStat, FileKind, FileStat, VirtualFile};

pub use engine;
pub use metadata;
pub use platform;
pub use vfile;
