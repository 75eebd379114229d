//! In-memory transport used by tests

use crate::transport::traits::{Frame, FrameStream, StreamConnector};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Stream half handed to the transport client
pub struct MemoryStream {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<String>,
    stall_writes: bool,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        if self.stall_writes {
            std::future::pending::<()>().await;
        }
        self.outbound
            .send(text)
            .map_err(|_| anyhow!("peer dropped"))
    }

    async fn close(&mut self) -> Result<()> {
        self.inbound.close();
        Ok(())
    }
}

/// Test-side end of an accepted link
pub struct MemoryPeer {
    pub to_client: mpsc::UnboundedSender<Frame>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    pub fn send_text(&self, text: &str) {
        let _ = self.to_client.send(Frame::Text(text.to_string()));
    }
}

/// Connector that accepts queued links and fails when none are queued
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pending: Arc<Mutex<VecDeque<MemoryStream>>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a link for the next connect attempt
    pub fn push_link(&self) -> MemoryPeer {
        self.queue_link(false)
    }

    /// Queue a link whose writes never complete
    pub fn push_stalled_link(&self) -> MemoryPeer {
        self.queue_link(true)
    }

    fn queue_link(&self, stall_writes: bool) -> MemoryPeer {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(MemoryStream {
                inbound,
                outbound,
                stall_writes,
            });
        }
        MemoryPeer {
            to_client,
            from_client,
        }
    }

    /// Instants at which connect was attempted
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StreamConnector for MemoryConnector {
    type Stream = MemoryStream;

    async fn connect(&self) -> Result<Self::Stream> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(Instant::now());
        }
        let next = self.pending.lock().ok().and_then(|mut p| p.pop_front());
        next.ok_or_else(|| anyhow!("connection refused"))
    }

    fn endpoint(&self) -> &str {
        "memory://test"
    }
}
