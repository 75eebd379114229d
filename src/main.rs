use anyhow::Result;
use ground_station::connection::TransportClient;
use ground_station::slots::SlotEvent;
use ground_station::state::VehicleChanged;
use ground_station::transport::WsConnector;
use ground_station::{Station, StationConfig, StationRequest};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = StationConfig::load()?;
    let url = config.websocket_url();

    info!("Ground station starting: {}", config.client_id);
    info!("  Telemetry stream: {}", url);
    if let Some(filter) = &config.vehicle_filter {
        info!("  Vehicle filter: {}", filter);
    }

    let (client, events) = TransportClient::start(WsConnector::new(url), config.connection_config());
    let cancel = client.cancellation_token();

    let mut link_status = client.watch_status();
    tokio::spawn(async move {
        while link_status.changed().await.is_ok() {
            let status = *link_status.borrow();
            info!("Link {} (epoch {})", status.state, status.epoch);
        }
    });

    let mut station = Station::new(config, Box::new(client));
    tokio::spawn(log_vehicle_changes(station.subscribe_vehicles()));
    tokio::spawn(log_slot_events(station.subscribe_slots()));

    if let Err(e) = station.create_slot() {
        error!("Failed to create initial slot: {}", e);
    }

    let (request_tx, requests) = mpsc::channel(32);
    tokio::spawn(read_console_requests(request_tx));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    station.run(events, requests, cancel).await;
    Ok(())
}

/// Turn console lines into station requests
async fn read_console_requests(requests: mpsc::Sender<StationRequest>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => match line.parse::<StationRequest>() {
                Ok(request) => {
                    if requests.send(request).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("{}", e),
            },
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read console: {}", e);
                break;
            }
        }
    }
}

async fn log_vehicle_changes(mut changes: mpsc::UnboundedReceiver<VehicleChanged>) {
    while let Some(change) = changes.recv().await {
        let latest = &change.summary.latest;
        let position = latest.position();
        debug!(
            "[{}] {} lat={:.6} lon={:.6} alt={:.1} hdg={:.0} bat={:.0}% connected={} history={}",
            change.vehicle_id,
            latest.model(),
            position.latitude,
            position.longitude,
            position.altitude,
            latest.heading(),
            latest.battery_level(),
            change.summary.is_connected,
            change.history_len
        );
    }
}

async fn log_slot_events(mut events: mpsc::UnboundedReceiver<SlotEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SlotEvent::Created(slot) => info!("[SLOT] Created {}", slot),
            SlotEvent::Removed(slot) => info!("[SLOT] Removed {}", slot),
            SlotEvent::AssignmentChanged { slot, vehicle_id } => match vehicle_id {
                Some(vehicle_id) => info!("[SLOT] {} -> {}", slot, vehicle_id),
                None => info!("[SLOT] {} cleared", slot),
            },
            SlotEvent::ActiveChanged(slot) => info!("[SLOT] Focus on {}", slot),
        }
    }
}

