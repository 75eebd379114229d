mod config;
mod fleet;
mod session;

use anyhow::Result;
use config::SimConfig;
use fleet::Fleet;
use futures::{SinkExt, StreamExt};
use groundstation_shared::{wire::CommandEnvelope, OutboundCommand};
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::tungstenite::Message;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = SimConfig::load()?;
    let fleet = Arc::new(RwLock::new(Fleet::new(
        config.fleet_size,
        &config.orbit_template(),
    )));
    let sessions = SessionManager::new();
    let (frames_tx, _) = broadcast::channel::<String>(256);

    tokio::spawn(stream_telemetry(
        fleet.clone(),
        frames_tx.clone(),
        config.tick_interval(),
    ));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "Simulator listening on {} with vehicles {:?}",
        config.bind_addr,
        fleet.read().await.vehicle_ids()
    );

    loop {
        let (socket, addr) = listener.accept().await?;
        let frames = frames_tx.subscribe();
        let fleet = fleet.clone();
        let sessions = sessions.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, addr, frames, &fleet, &sessions).await {
                warn!("Client {} failed: {}", addr, e);
            }
            if let Some(client) = sessions.unregister(addr).await {
                info!(
                    "Client disconnected: {} after {:?} ({} commands)",
                    client.addr,
                    client.connected_at.elapsed(),
                    client.commands_received
                );
            }
        });
    }
}

/// Publish one frame per vehicle every tick
async fn stream_telemetry(
    fleet: Arc<RwLock<Fleet>>,
    frames_tx: broadcast::Sender<String>,
    interval: Duration,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let elapsed = started.elapsed().as_secs_f64();
        let frames = fleet.read().await.frames_at(elapsed);
        for frame in frames {
            // No receivers just means no client is connected
            let _ = frames_tx.send(frame);
        }
    }
}

async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    mut frames: broadcast::Receiver<String>,
    fleet: &RwLock<Fleet>,
    sessions: &SessionManager,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(socket).await?;
    sessions.register(addr).await;
    info!("Client connected: {} ({} total)", addr, sessions.count().await);

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Ok(text) => sink.send(Message::Text(text)).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Client {} lagging, skipped {} frames", addr, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    handle_command(&text, addr, fleet, sessions).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            },
        }
    }
    Ok(())
}

async fn handle_command(text: &str, addr: SocketAddr, fleet: &RwLock<Fleet>, sessions: &SessionManager) {
    let envelope: CommandEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Unparseable message from {}: {}", addr, e);
            return;
        }
    };

    let Some(command) = OutboundCommand::from_envelope(&envelope) else {
        warn!("Unknown command from {}: {:?}", addr, envelope);
        return;
    };

    sessions.record_command(addr).await;
    let received = sessions.info(addr).await.map_or(0, |c| c.commands_received);
    info!("[{}] command #{}: {:?}", addr, received, command);

    if !fleet.write().await.apply(&command) {
        warn!("No simulated vehicle named {}", command.vehicle_id());
    }
}
