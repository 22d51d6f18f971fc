use std::sync::Mutex;

use tokio::sync::{broadcast, mpsc};
use vehiclestation_shared::{KeyEvent, LinkStatus, TelemetryRow};

use crate::history::TelemetryHistory;

pub struct AppState {
    /// Telemetry history backing `/api/recent`.
    pub history: Mutex<TelemetryHistory>,

    /// Key transitions from dashboard clients → session.
    pub key_tx: mpsc::Sender<KeyEvent>,

    /// Telemetry snapshots → dashboard clients.
    pub telemetry_tx: broadcast::Sender<TelemetryRow>,

    /// Link lifecycle banners → dashboard clients.
    pub status_tx: broadcast::Sender<LinkStatus>,

    /// Last status, replayed to clients that attach mid-session.
    pub status: Mutex<LinkStatus>,
}

impl AppState {
    pub fn set_status(&self, status: LinkStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
        let _ = self.status_tx.send(status);
    }

    pub fn current_status(&self) -> LinkStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, row: TelemetryRow) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(row);
    }
}

/// Wall-clock milliseconds since the epoch, the timestamp base for every row.
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
