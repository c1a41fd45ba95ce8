use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::codec::{Frame, FrameCodec, FrameConfig};
use crate::error::Result;
use crate::kind::kind_name;
use crate::wire::Message;

/// Writes complete frames to any `AsyncWrite` half.
pub struct FrameWriter<T> {
    inner: FramedWrite<T, FrameCodec>,
}

impl<T: AsyncWrite + Unpin> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner: FramedWrite::new(inner, FrameCodec::new(config)),
        }
    }

    /// Write and flush a complete frame.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<()> {
        self.inner.send(frame).await
    }

    /// Serialize an envelope and write it as one frame.
    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        let frame = message.to_frame()?;
        tracing::trace!(kind = kind_name(frame.kind), size = frame.wire_size(), "write frame");
        self.write_frame(frame).await
    }

    /// Flush and shut down the write half.
    pub async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        self.inner.encoder().config()
    }
}
