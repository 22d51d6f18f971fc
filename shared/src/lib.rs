use serde::{Deserialize, Serialize};

/// Logical key symbol reported by the dashboard page.
/// Arrow keys and space map to drive commands; escape ends the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySym {
    Up,
    Down,
    Left,
    Right,
    Space,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Press,
    Release,
}

/// One key transition from the dashboard, exactly as it arrives over the
/// WebSocket: `{ "key": "up", "action": "press" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: KeySym,
    pub action: KeyAction,
}

/// Snapshot of everything the dashboard renders.
///
/// Acceleration is in g, relative to the baseline captured on the first frame
/// after connect. Speed is in cm/s, distance in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRow {
    pub timestamp_ms: i64,
    pub speed: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub distance_m: f64,
    pub battery_pct: u64,
}

impl TelemetryRow {
    pub fn empty(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            speed: 0.0,
            accel_x: 0.0,
            accel_y: 0.0,
            accel_z: 0.0,
            distance_m: 0.0,
            battery_pct: 0,
        }
    }
}

/// Link lifecycle, mirrored to the dashboard as a status banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
}
