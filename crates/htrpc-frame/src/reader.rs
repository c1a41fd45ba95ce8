use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::codec::{Frame, FrameCodec, FrameConfig};
use crate::error::{FrameError, Result};
use crate::kind::kind_name;
use crate::wire::Message;

/// Reads complete frames from any `AsyncRead` half.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: FramedRead<T, FrameCodec>,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner: FramedRead::new(inner, FrameCodec::new(config)),
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        match self.inner.next().await {
            Some(frame) => frame,
            None => Err(FrameError::ConnectionClosed),
        }
    }

    /// Read and parse the next envelope.
    pub async fn read_message(&mut self) -> Result<Message> {
        let frame = self.read_frame().await?;
        tracing::trace!(kind = kind_name(frame.kind), size = frame.wire_size(), "read frame");
        Message::from_frame(&frame)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.inner.decoder().config()
    }
}
