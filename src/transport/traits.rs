//! Transport trait abstraction for pluggable stream backends

use anyhow::Result;
use async_trait::async_trait;

/// A frame read from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame, handed to the decoder verbatim
    Text(String),
    /// Binary, ping/pong or any other non-text frame (ignored)
    Other,
}

/// An open, message-oriented stream to the telemetry source
#[async_trait]
pub trait FrameStream: Send + 'static {
    /// Wait for the next frame. `None` means the peer closed the stream.
    ///
    /// Must be cancel-safe: it is raced against outbound sends and shutdown.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Write one text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the stream gracefully
    async fn close(&mut self) -> Result<()>;
}

/// Factory for creating stream connections
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    /// The stream type this connector produces
    type Stream: FrameStream;

    /// Attempt to connect, returning a stream on success
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human-readable endpoint for logging
    fn endpoint(&self) -> &str;
}
