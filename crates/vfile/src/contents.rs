use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::io::AsyncRead;

/// Readable byte source backing [`Contents::Stream`].
pub type ContentStream = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Payload of a [`VirtualFile`](crate::VirtualFile).
#[derive(Default)]
pub enum Contents {
    /// No payload. Writing an empty file is a no-op.
    #[default]
    Empty,
    /// Whole payload held in memory.
    Buffer(Vec<u8>),
    /// Payload pulled from a reader while writing.
    Stream(ContentStream),
    /// Target of a symbolic link.
    Symlink(PathBuf),
}

impl Contents {
    /// Wraps `reader` as streamed contents.
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Self::Stream(Box::pin(reader))
    }

    /// Reports whether no payload is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Reports whether the payload is a symbolic link target.
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        matches!(self, Self::Symlink(_))
    }

    /// Reports whether the payload is a stream.
    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// In-memory payload, if any.
    #[must_use]
    pub fn as_buffer(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Symbolic link target, if any.
    #[must_use]
    pub fn symlink_target(&self) -> Option<&std::path::Path> {
        match self {
            Self::Symlink(target) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Buffer(bytes) => f.debug_tuple("Buffer").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Symlink(target) => f.debug_tuple("Symlink").field(target).finish(),
        }
    }
}

impl From<Vec<u8>> for Contents {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffer(bytes)
    }
}

impl From<&[u8]> for Contents {
    fn from(bytes: &[u8]) -> Self {
        Self::Buffer(bytes.to_vec())
    }
}
