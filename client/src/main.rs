// main.rs

mod dispatcher;
mod history;
mod link;
mod protocol;
mod session;
mod sim;
mod state;
mod telemetry;
mod web;

use crate::history::TelemetryHistory;
use crate::link::VehicleLink;
use crate::sim::SimVehicle;
use crate::state::AppState;

use anyhow::Context;
use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;
use vehiclestation_shared::LinkStatus;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const HISTORY_CAPACITY: usize = 1_024;

fn bind_addr() -> String {
    std::env::var("STATION_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

/// Pick the vehicle transport. Only the simulated vehicle is built in; a
/// hardware BLE bridge plugs in as another `VehicleLink` implementation.
fn open_link() -> anyhow::Result<Box<dyn VehicleLink>> {
    match std::env::var("STATION_LINK").as_deref() {
        Err(_) | Ok("sim") => {
            tracing::info!("using simulated vehicle link");
            Ok(Box::new(SimVehicle::connect()))
        }
        Ok(other) => anyhow::bail!("unsupported STATION_LINK {other:?} (expected \"sim\")"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Channels ---
    let (key_tx, key_rx) = mpsc::channel(64);
    let (notif_tx, notif_rx) = mpsc::channel(256);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);

    // --- Shared state ---
    let state = Arc::new(AppState {
        history: Mutex::new(TelemetryHistory::new(HISTORY_CAPACITY)),
        key_tx,
        telemetry_tx: broadcast::channel(512).0,
        status_tx: broadcast::channel(16).0,
        status: Mutex::new(LinkStatus::Disconnected),
    });

    let link = open_link()?;

    // Ctrl-C ends the session the same way the dashboard's exit key does.
    let ctrlc_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received");
            let _ = ctrlc_shutdown.send(());
        }
    });

    // --- Session ---
    let session = tokio::spawn(session::session_task(
        state.clone(),
        link,
        notif_tx,
        notif_rx,
        key_rx,
        shutdown_rx,
    ));

    // --- Webserver ---
    let app: Router = web::router(state);

    let addr = bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("dashboard live at http://{addr}");

    // The web surface exists to serve the session; when the session ends
    // (exit key, transport failure, Ctrl-C), stop serving and exit.
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = session.await;
        })
        .await?;
    Ok(())
}
