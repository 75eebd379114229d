//! Transport client with persistent connection and automatic reconnection

use super::backoff::Backoff;
use crate::commands::CommandSink;
use crate::transport::{Frame, FrameStream, StreamConnector};
use anyhow::Result;
use groundstation_shared::{
    codec, defaults,
    link_state::{LinkEvent, LinkStateMachine, Transition},
    LinkStatus, OutboundCommand,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events emitted by the transport client to its single consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The link reached `Open`
    Connected { epoch: u64 },
    /// The link left `Open`
    Disconnected { reason: String },
    /// A text frame, verbatim, in arrival order
    Received(String),
}

/// Configuration for the transport client
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    /// Maximum reconnection delay
    pub max_reconnect_delay: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Capacity of the queue towards the consumer
    pub event_queue_capacity: usize,
    /// Capacity of the outbound command queue
    pub outbound_queue_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(defaults::BACKOFF_INITIAL_MS),
            max_reconnect_delay: Duration::from_millis(defaults::BACKOFF_MAX_MS),
            connect_timeout: Duration::from_millis(defaults::CONNECT_TIMEOUT_MS),
            event_queue_capacity: 256,
            outbound_queue_capacity: 32,
        }
    }
}

/// A serialized command bound to the connection it was accepted on
#[derive(Debug)]
struct OutboundFrame {
    epoch: u64,
    text: String,
}

/// Owns one logical stream connection and hides transient link failures
pub struct TransportClient {
    endpoint: String,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    status_rx: watch::Receiver<LinkStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TransportClient {
    /// Start the connection loop on a background task
    ///
    /// Returns the client handle and the receiver for the single consumer.
    pub fn start<C: StreamConnector>(
        connector: C,
        config: ConnectionConfig,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity.max(1));
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let cancel = CancellationToken::new();
        let endpoint = connector.endpoint().to_string();

        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            connection_loop(connector, config, outbound_rx, event_tx, status_tx, loop_cancel).await;
        });

        let client = Self {
            endpoint,
            outbound_tx,
            status_rx,
            cancel,
            task: Some(task),
        };
        (client, event_rx)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current link state and connection epoch
    pub fn status(&self) -> LinkStatus {
        *self.status_rx.borrow()
    }

    /// Watch link status changes (for "CONNECTING…" style indicators)
    pub fn watch_status(&self) -> watch::Receiver<LinkStatus> {
        self.status_rx.clone()
    }

    /// Send a command if the link is open
    ///
    /// At-most-once: when the link is not open the command is logged and
    /// discarded. Returns whether the command was handed to the open link.
    pub fn send_command(&self, command: &OutboundCommand) -> bool {
        let status = self.status();
        if !status.is_open() {
            warn!(
                "Link {}: discarding command for {}: {:?}",
                status.state,
                command.vehicle_id(),
                command
            );
            return false;
        }

        let text = match codec::encode_command(command) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode command {:?}: {}", command, e);
                return false;
            }
        };

        match self.outbound_tx.try_send(OutboundFrame {
            epoch: status.epoch,
            text,
        }) {
            Ok(()) => {
                debug!("Queued command for {}: {:?}", command.vehicle_id(), command);
                true
            }
            Err(e) => {
                warn!("Dropping command for {}: {}", command.vehicle_id(), e);
                false
            }
        }
    }

    /// Stop the receive loop and prevent further reconnects (idempotent)
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the background task to release the connection
    pub async fn shutdown_and_wait(&mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// A token that is cancelled when this client shuts down
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl CommandSink for TransportClient {
    fn send_command(&self, command: &OutboundCommand) -> bool {
        TransportClient::send_command(self, command)
    }
}

impl Drop for TransportClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How an open link ended
enum LinkEnd {
    PeerClosed,
    Cancelled,
}

/// Main connection loop with reconnection logic
async fn connection_loop<C: StreamConnector>(
    connector: C,
    config: ConnectionConfig,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    status_tx: watch::Sender<LinkStatus>,
    cancel: CancellationToken,
) {
    let mut fsm = LinkStateMachine::new();
    let mut backoff = Backoff::new(config.reconnect_delay, config.max_reconnect_delay);
    let endpoint = connector.endpoint().to_string();

    loop {
        transition(&mut fsm, &status_tx, LinkEvent::ConnectStarted);
        info!("Connecting to {}", endpoint);

        let attempt = tokio::select! {
            _ = cancel.cancelled() => None,
            result = timeout(config.connect_timeout, connector.connect()) => Some(result),
        };

        match attempt {
            None => {
                transition(&mut fsm, &status_tx, LinkEvent::CloseRequested);
                transition(&mut fsm, &status_tx, LinkEvent::Released);
                break;
            }
            Some(Ok(Ok(stream))) => {
                backoff.reset();
                transition(&mut fsm, &status_tx, LinkEvent::Established);
                let epoch = fsm.status().epoch;
                info!("Connected to {} (epoch {})", endpoint, epoch);

                if !forward(&event_tx, ConnectionEvent::Connected { epoch }, &cancel).await {
                    transition(&mut fsm, &status_tx, LinkEvent::CloseRequested);
                    transition(&mut fsm, &status_tx, LinkEvent::Released);
                    break;
                }

                let outcome =
                    handle_connection(stream, epoch, &mut outbound_rx, &event_tx, &cancel).await;

                let (reason, stop) = match outcome {
                    Ok(LinkEnd::Cancelled) => {
                        transition(&mut fsm, &status_tx, LinkEvent::CloseRequested);
                        ("client shut down".to_string(), true)
                    }
                    Ok(LinkEnd::PeerClosed) => {
                        transition(&mut fsm, &status_tx, LinkEvent::CloseRequested);
                        ("closed by peer".to_string(), false)
                    }
                    Err(e) => {
                        transition(&mut fsm, &status_tx, LinkEvent::Failed);
                        (format!("link error: {}", e), false)
                    }
                };
                transition(&mut fsm, &status_tx, LinkEvent::Released);
                warn!("Disconnected from {}: {}", endpoint, reason);

                if stop {
                    // Best effort only: the consumer may already be gone on shutdown
                    let _ = event_tx.try_send(ConnectionEvent::Disconnected { reason });
                    break;
                }
                if !forward(&event_tx, ConnectionEvent::Disconnected { reason }, &cancel).await {
                    break;
                }
            }
            Some(Ok(Err(e))) => {
                transition(&mut fsm, &status_tx, LinkEvent::Failed);
                transition(&mut fsm, &status_tx, LinkEvent::Released);
                warn!("Connection to {} failed: {}", endpoint, e);
            }
            Some(Err(_)) => {
                transition(&mut fsm, &status_tx, LinkEvent::Failed);
                transition(&mut fsm, &status_tx, LinkEvent::Released);
                warn!(
                    "Connection to {} timed out after {:?}",
                    endpoint, config.connect_timeout
                );
            }
        }

        // Wait before reconnecting
        let delay = backoff.next_delay();
        info!("Reconnecting to {} in {:?}", endpoint, delay);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(delay) => {}
        }
    }

    info!("Transport client for {} stopped", endpoint);
}

/// Handle an active connection
async fn handle_connection<S: FrameStream>(
    mut stream: S,
    epoch: u64,
    outbound_rx: &mut mpsc::Receiver<OutboundFrame>,
    event_tx: &mpsc::Sender<ConnectionEvent>,
    cancel: &CancellationToken,
) -> Result<LinkEnd> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = stream.close().await {
                    debug!("Error while closing stream: {}", e);
                }
                return Ok(LinkEnd::Cancelled);
            }

            // Send outbound commands accepted on this connection
            Some(frame) = outbound_rx.recv() => {
                if frame.epoch != epoch {
                    debug!("Discarding command from connection epoch {}", frame.epoch);
                    continue;
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(LinkEnd::Cancelled),
                    sent = stream.send_text(frame.text) => sent?,
                }
            }

            // Read incoming frames
            incoming = stream.next_frame() => {
                match incoming {
                    None => return Ok(LinkEnd::PeerClosed),
                    Some(Err(e)) => return Err(e),
                    Some(Ok(Frame::Other)) => {}
                    Some(Ok(Frame::Text(text))) => {
                        if !forward(event_tx, ConnectionEvent::Received(text), cancel).await {
                            let _ = stream.close().await;
                            return Ok(LinkEnd::Cancelled);
                        }
                    }
                }
            }
        }
    }
}

/// Hand an event to the consumer; false once the consumer is gone or we are stopping
async fn forward(
    event_tx: &mpsc::Sender<ConnectionEvent>,
    event: ConnectionEvent,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        sent = event_tx.send(event) => sent.is_ok(),
    }
}

fn transition(fsm: &mut LinkStateMachine, status_tx: &watch::Sender<LinkStatus>, event: LinkEvent) {
    match fsm.apply(event) {
        Transition::Changed { from, to } => {
            debug!("Link {} -> {}", from, to);
            status_tx.send_replace(fsm.status());
        }
        Transition::Invalid { from, event } => {
            warn!("Ignoring link event {:?} in state {}", event, from);
        }
    }
}
