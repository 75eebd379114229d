//! WebSocket transport implementation

use crate::transport::traits::{Frame, FrameStream, StreamConnector};
use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// WebSocket stream wrapper implementing FrameStream
pub struct WsFrameStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsFrameStream {
    pub fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self { inner: stream }
    }
}

#[async_trait]
impl FrameStream for WsFrameStream {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        match self.inner.next().await? {
            Ok(Message::Text(text)) => Some(Ok(Frame::Text(text))),
            Ok(Message::Close(_)) => None,
            Ok(_) => Some(Ok(Frame::Other)),
            Err(e) => Some(Err(e.into())),
        }
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close(None).await?;
        Ok(())
    }
}

/// WebSocket connector for a telemetry endpoint URL
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    type Stream = WsFrameStream;

    async fn connect(&self) -> Result<Self::Stream> {
        let (stream, _response) = connect_async(self.url.as_str()).await?;
        Ok(WsFrameStream::new(stream))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
