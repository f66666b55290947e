//! Fixtures shared by the integration tests.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
pub use test_support::TestDir;
use vfdest::{Destination, DestinationOptions};

static TRACING: Once = Once::new();

/// Installs a test subscriber once per binary. Output is controlled with
/// `RUST_LOG`, e.g. `RUST_LOG=vfdest::write=trace`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Destination writing to `<dir>/out`, with `dir` as working directory.
pub fn destination_in(dir: &TestDir) -> Destination {
    destination_with(dir, DestinationOptions::new())
}

/// Like [`destination_in`], with extra options applied on top.
pub fn destination_with(dir: &TestDir, options: DestinationOptions) -> Destination {
    init_tracing();
    Destination::new("out").with_options(options.cwd(dir.path()))
}

/// Reader yielding `chunks` chunks of `chunk_size` bytes and counting how many
/// reads were served.
#[derive(Debug)]
pub struct ChunkedReader {
    chunk_size: usize,
    remaining: usize,
    reads: Arc<AtomicUsize>,
}

impl ChunkedReader {
    pub fn new(chunk_size: usize, chunks: usize) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                chunk_size,
                remaining: chunks,
                reads: Arc::clone(&reads),
            },
            reads,
        )
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.remaining == 0 {
            return Poll::Ready(Ok(()));
        }
        let len = self.chunk_size.min(buf.remaining());
        buf.put_slice(&vec![b'c'; len]);
        self.remaining -= 1;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Reader that fails on the first read.
#[derive(Debug, Default)]
pub struct FailingReader;

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::other("source exploded")))
    }
}
