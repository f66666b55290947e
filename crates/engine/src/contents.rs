//! Materializes a file's contents at its resolved path.
//!
//! One writer per payload kind; [`write_contents`] picks the writer and
//! absorbs collisions when overwriting is disabled.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use vfile::{ContentStream, Contents, DiskStat, VirtualFile};

use crate::debug_write::{
    trace_directory_unreadable, trace_reconciled, trace_stream_complete, trace_write_collision,
    trace_write_start,
};
use crate::descriptor::{WriteContext, close_after_failure, reconcile_and_close, reconcile_in_hook};
use crate::error::{IoResultExt, WriteError, WriteResult, settle};
use crate::link::{LinkSite, create_link, link_target, remove_existing, resolve_link_kind};
use crate::mkdir::ensure_dir;
use crate::options::WriteOptions;
use crate::stream::{FinishError, LazyFileReader, LazyFileWriter, PipeError, pipe};

/// Writes the payload of `file` to [`VirtualFile::path`].
///
/// The payload kind decides the writer, checked in this order: directory
/// flag, symbolic link, stream, buffer. An empty payload writes nothing.
///
/// On success `file.stat` describes the written entry. When overwriting is
/// disabled and the destination already exists, the existing entry is left
/// untouched and the call succeeds.
///
/// # Errors
///
/// Returns the first failure of the chosen writer.
pub(crate) async fn write_contents(
    context: &WriteContext,
    file: &mut VirtualFile,
    options: &WriteOptions,
) -> WriteResult<()> {
    let outcome = if file.is_directory() {
        trace_write_start(file.path(), "directory", options.flag());
        write_directory(context, file).await
    } else {
        match file.take_contents() {
            Contents::Symlink(target) => {
                trace_write_start(file.path(), "symlink", options.flag());
                let written = write_link(context, file, &target, options).await;
                if file.contents().is_empty() {
                    file.set_contents(Contents::Symlink(target));
                }
                written
            }
            Contents::Stream(stream) => {
                trace_write_start(file.path(), "stream", options.flag());
                write_stream(context, file, stream, options).await
            }
            Contents::Buffer(bytes) => {
                trace_write_start(file.path(), "buffer", options.flag());
                let written = write_buffer(context, file, &bytes, options).await;
                file.set_contents(Contents::Buffer(bytes));
                written
            }
            Contents::Empty => Ok(()),
        }
    };

    match outcome {
        Err(error) if options.flag().is_exclusive() && error.is_already_exists() => {
            trace_write_collision(file.path());
            Ok(())
        }
        other => other,
    }
}

/// Creates the directory and reconciles its metadata.
///
/// A directory that cannot be opened keeps the metadata `ensure_dir` gave it.
async fn write_directory(context: &WriteContext, file: &mut VirtualFile) -> WriteResult<()> {
    let path = file.path().to_path_buf();
    let mode = file.stat().mode;
    ensure_dir(&path, mode).await?;

    let ops = Arc::clone(&context.ops);
    let open_path = path.clone();
    let opened = tokio::task::spawn_blocking(move || ops.open_directory(&open_path)).await?;
    let handle = match opened {
        Ok(handle) => handle,
        Err(error) if error.kind() == io::ErrorKind::PermissionDenied => {
            trace_directory_unreadable(&path);
            return Ok(());
        }
        Err(error) => return Err(WriteError::io("open directory", path, error)),
    };

    let desired = *file.stat();
    let observed = reconcile_and_close(context, handle, path, desired).await?;
    *file.stat_mut() = observed;
    Ok(())
}

/// Writes an in-memory payload through a single descriptor.
async fn write_buffer(
    context: &WriteContext,
    file: &mut VirtualFile,
    bytes: &[u8],
    options: &WriteOptions,
) -> WriteResult<()> {
    let path = file.path().to_path_buf();
    let open = tokio::fs::OpenOptions::from(options.flag().open_options(file.stat().mode));
    let mut handle = open.open(&path).await.with_path("open destination", &path)?;

    let written = write_and_flush(&mut handle, bytes).await;
    let handle = handle.into_std().await;
    if let Err(error) = written {
        let error = WriteError::io("write contents", &path, error);
        return Err(close_after_failure(handle, &path, error).await);
    }

    let desired = *file.stat();
    let observed = reconcile_and_close(context, handle, path, desired).await?;
    *file.stat_mut() = observed;
    Ok(())
}

async fn write_and_flush(handle: &mut tokio::fs::File, bytes: &[u8]) -> io::Result<()> {
    handle.write_all(bytes).await?;
    handle.flush().await
}

/// Pumps a stream into a lazily opened destination.
///
/// On success the file's contents become a reader over the written file,
/// since the original stream has been consumed.
async fn write_stream(
    context: &WriteContext,
    file: &mut VirtualFile,
    mut stream: ContentStream,
    options: &WriteOptions,
) -> WriteResult<()> {
    let path = file.path().to_path_buf();
    let mut writer = LazyFileWriter::new(&path, file.stat().mode, options.flag());

    let pumped = pipe(&mut stream, &mut writer).await;
    drop(stream);
    let bytes = match pumped {
        Ok(bytes) => bytes,
        Err(error) => {
            let primary = match error {
                PipeError::Source(error) => WriteError::source(&path, error),
                PipeError::Destination(error) => WriteError::io("write contents", &path, error),
            };
            let closed = writer.abort().await.with_path("close destination", &path);
            return settle(Err(primary), closed);
        }
    };
    trace_stream_complete(&path, bytes);

    let ops = Arc::clone(&context.ops);
    let capabilities = context.capabilities;
    let desired = *file.stat();
    let hook_path = path.clone();
    let finished = writer
        .finish(move |handle| {
            reconcile_in_hook(&*ops, capabilities, handle, &hook_path, desired)
        })
        .await;

    let (observed, report) = finished.map_err(|error| match error {
        FinishError::Open(error) => WriteError::io("open destination", &path, error),
        FinishError::Flush(error) => WriteError::io("write contents", &path, error),
        FinishError::Hook(error) => WriteError::Metadata(error),
        FinishError::Close(error) => WriteError::io("close destination", &path, error),
        FinishError::Join(error) => WriteError::Join(error),
    })?;
    trace_reconciled(&path, &report);

    *file.stat_mut() = observed;
    file.set_contents(Contents::stream(LazyFileReader::new(path)));
    Ok(())
}

/// Creates a symbolic link (or junction) and records its `lstat`.
///
/// With overwriting enabled, whatever occupies the path is removed first.
/// On success the file's contents hold the target actually stored in the
/// link.
async fn write_link(
    context: &WriteContext,
    file: &mut VirtualFile,
    target: &Path,
    options: &WriteOptions,
) -> WriteResult<()> {
    let path = file.path().to_path_buf();
    let site = LinkSite {
        cwd: options.cwd().to_path_buf(),
        points_to_directory: file.stat().is_directory(),
    };
    let kind =
        resolve_link_kind(&site, target, context.capabilities, options.use_junctions()).await?;
    let stored = link_target(
        options.cwd(),
        options.base(),
        target,
        kind,
        options.relative_symlinks(),
    );

    if !options.flag().is_exclusive() {
        remove_existing(&path)
            .await
            .with_path("remove existing entry", &path)?;
    }
    create_link(&stored, &path, kind)
        .await
        .with_path("create symbolic link", &path)?;

    let metadata = tokio::fs::symlink_metadata(&path)
        .await
        .with_path("inspect symbolic link", &path)?;
    file.stat_mut().mirror(&DiskStat::from_metadata(&metadata));
    file.set_contents(Contents::Symlink(stored));
    Ok(())
}
