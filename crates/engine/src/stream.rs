//! Lazily opened file streams.
//!
//! [`LazyFileWriter`] defers opening its destination until the first write
//! and hands the descriptor to a caller-supplied hook before closing it, so
//! metadata can be reconciled on the same descriptor that received the bytes.
//! [`LazyFileReader`] is the read-side counterpart used to expose a written
//! file as streamed contents again.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::task;

use crate::debug_write::trace_cleanup_suppressed;
use crate::error::WriteError;
use crate::options::WriteFlag;

/// Size of the chunks moved by [`pipe`].
pub const PIPE_CHUNK_SIZE: usize = 64 * 1024;

enum State {
    Idle,
    Opening(task::JoinHandle<io::Result<std::fs::File>>),
    Open(File),
    Closed,
}

impl State {
    const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening(_) => "opening",
            Self::Open(_) => "open",
            Self::Closed => "closed",
        }
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream already closed")
}

fn start_open(options: std::fs::OpenOptions, path: PathBuf) -> State {
    State::Opening(task::spawn_blocking(move || options.open(path)))
}

/// Drives a pending open to completion and moves `state` to `Open` or
/// `Closed`.
fn poll_opening(state: &mut State, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
    let State::Opening(handle) = state else {
        return Poll::Ready(Ok(()));
    };
    let opened =
        ready!(Pin::new(handle).poll(cx)).unwrap_or_else(|error| Err(io::Error::other(error)));
    match opened {
        Ok(file) => {
            *state = State::Open(File::from_std(file));
            Poll::Ready(Ok(()))
        }
        Err(error) => {
            *state = State::Closed;
            Poll::Ready(Err(error))
        }
    }
}

/// Failure while finishing a [`LazyFileWriter`].
#[derive(Debug)]
pub enum FinishError<E> {
    /// The destination could not be opened.
    Open(io::Error),
    /// Buffered bytes could not be flushed.
    Flush(io::Error),
    /// The hook reported an error. The descriptor was still closed.
    Hook(E),
    /// Closing the descriptor failed.
    Close(io::Error),
    /// The blocking task running the hook did not complete.
    Join(task::JoinError),
}

/// Write side of a destination that is opened on first use.
pub struct LazyFileWriter {
    path: PathBuf,
    mode: Option<u32>,
    flag: WriteFlag,
    state: State,
    written: u64,
}

impl LazyFileWriter {
    /// Creates a writer for `path`; nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, mode: Option<u32>, flag: WriteFlag) -> Self {
        Self {
            path: path.into(),
            mode,
            flag,
            state: State::Idle,
            written: 0,
        }
    }

    /// Destination path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes accepted so far.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Reports whether the destination has been opened and not yet closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    fn poll_file(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<&mut File>> {
        loop {
            match self.state {
                State::Idle => {
                    self.state = start_open(self.flag.open_options(self.mode), self.path.clone());
                }
                State::Opening(_) => ready!(poll_opening(&mut self.state, cx))?,
                State::Open(_) => break,
                State::Closed => return Poll::Ready(Err(closed_error())),
            }
        }
        match &mut self.state {
            State::Open(file) => Poll::Ready(Ok(file)),
            _ => Poll::Ready(Err(closed_error())),
        }
    }

    /// Opens the destination if that has not happened yet.
    ///
    /// # Errors
    ///
    /// Returns the open error, after which the writer is closed.
    pub async fn open(&mut self) -> io::Result<()> {
        std::future::poll_fn(|cx| self.poll_file(cx).map_ok(|_| ())).await
    }

    /// Flushes the destination, runs `hook` on its descriptor and closes it.
    ///
    /// A writer that never received bytes is opened first, so an empty
    /// stream still produces an empty file. The hook and the close run on a
    /// blocking thread. The descriptor is closed exactly once, even when an
    /// earlier step fails; the earliest failure is the one returned.
    ///
    /// # Errors
    ///
    /// See [`FinishError`].
    pub async fn finish<F, T, E>(mut self, hook: F) -> Result<T, FinishError<E>>
    where
        F: FnOnce(&std::fs::File) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.open().await.map_err(FinishError::Open)?;
        let State::Open(mut file) = std::mem::replace(&mut self.state, State::Closed) else {
            return Err(FinishError::Open(closed_error()));
        };

        let flushed = file.flush().await;
        let file = file.into_std().await;

        if let Err(error) = flushed {
            let closed = task::spawn_blocking(move || platform::close_file(file)).await;
            if let Some(suppressed) = suppressed_close(&self.path, closed) {
                trace_cleanup_suppressed(&suppressed);
            }
            return Err(FinishError::Flush(error));
        }

        let (hooked, closed) = task::spawn_blocking(move || {
            let hooked = hook(&file);
            (hooked, platform::close_file(file))
        })
        .await
        .map_err(FinishError::Join)?;

        let value = match hooked {
            Ok(value) => value,
            Err(error) => {
                if let Some(suppressed) = suppressed_close(&self.path, Ok(closed)) {
                    trace_cleanup_suppressed(&suppressed);
                }
                return Err(FinishError::Hook(error));
            }
        };
        closed.map_err(FinishError::Close)?;
        Ok(value)
    }

    /// Closes the destination without running a hook.
    ///
    /// An open still in flight is awaited so its descriptor is not leaked.
    ///
    /// # Errors
    ///
    /// Returns the close error. Open failures are ignored since nothing is
    /// left to close.
    pub async fn abort(mut self) -> io::Result<()> {
        let file = match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(file) => file,
            State::Opening(handle) => match handle.await {
                Ok(Ok(file)) => File::from_std(file),
                Ok(Err(_)) | Err(_) => return Ok(()),
            },
            State::Idle | State::Closed => return Ok(()),
        };
        let file = file.into_std().await;
        task::spawn_blocking(move || platform::close_file(file))
            .await
            .map_err(io::Error::other)?
    }
}

/// Close failure that lost to an earlier error, if the close failed at all.
fn suppressed_close(
    path: &Path,
    closed: Result<io::Result<()>, task::JoinError>,
) -> Option<WriteError> {
    match closed {
        Ok(Ok(())) => None,
        Ok(Err(error)) => Some(WriteError::io("close destination", path, error)),
        Err(error) => Some(WriteError::Join(error)),
    }
}

impl fmt::Debug for LazyFileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFileWriter")
            .field("path", &self.path)
            .field("flag", &self.flag)
            .field("state", &self.state.name())
            .field("written", &self.written)
            .finish()
    }
}

impl AsyncWrite for LazyFileWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let file = ready!(this.poll_file(cx))?;
        let accepted = ready!(Pin::new(file).poll_write(cx, buf))?;
        this.written += accepted as u64;
        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().state {
            State::Open(file) => Pin::new(file).poll_flush(cx),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}

/// Read side of a file that is opened on first read.
pub struct LazyFileReader {
    path: PathBuf,
    state: State,
}

impl LazyFileReader {
    /// Creates a reader for `path`; nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: State::Idle,
        }
    }

    /// Source path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for LazyFileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFileReader")
            .field("path", &self.path)
            .field("state", &self.state.name())
            .finish()
    }
}

impl AsyncRead for LazyFileReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match this.state {
                State::Idle => {
                    let mut options = std::fs::OpenOptions::new();
                    options.read(true);
                    this.state = start_open(options, this.path.clone());
                }
                State::Opening(_) => ready!(poll_opening(&mut this.state, cx))?,
                State::Open(ref mut file) => return Pin::new(file).poll_read(cx, buf),
                State::Closed => return Poll::Ready(Err(closed_error())),
            }
        }
    }
}

/// Side of a [`pipe`] that failed.
#[derive(Debug)]
pub enum PipeError {
    /// Reading from the source failed.
    Source(io::Error),
    /// Writing to the destination failed.
    Destination(io::Error),
}

/// Moves every byte from `source` into `destination`.
///
/// Each chunk is fully written before the next one is read, so a slow
/// destination throttles the source. The first failure on either side ends
/// the transfer.
///
/// # Errors
///
/// Returns the failing side together with its error.
pub async fn pipe<R, W>(source: &mut R, destination: &mut W) -> Result<u64, PipeError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0_u8; PIPE_CHUNK_SIZE];
    let mut total = 0_u64;
    loop {
        let read = source.read(&mut buffer).await.map_err(PipeError::Source)?;
        if read == 0 {
            return Ok(total);
        }
        destination
            .write_all(&buffer[..read])
            .await
            .map_err(PipeError::Destination)?;
        total += read as u64;
    }
}
