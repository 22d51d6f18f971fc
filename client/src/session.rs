//! One connection's control loop.
//!
//! The session owns the link, the decoder, the dispatcher, and the dashboard
//! snapshot; every event funnels through a single `select!` loop so all
//! mutable state has exactly one writer. Teardown (unsubscribe everything,
//! then disconnect) runs exactly once no matter which path ends the loop.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{Duration, interval};
use vehiclestation_shared::{KeyEvent, LinkStatus, TelemetryRow};

use crate::dispatcher::{Dispatch, Dispatcher};
use crate::link::{Notification, VehicleLink};
use crate::protocol::{CMD_ACTIVATE, CMD_DEACTIVATE, TelemetryChannel};
use crate::state::{AppState, now_ms};
use crate::telemetry::{Reading, TelemetryDecoder};

/// Dashboard refresh cadence; dirty snapshots are broadcast on this tick.
const REDRAW_PERIOD_MS: u64 = 50;

struct Session {
    link: Box<dyn VehicleLink>,
    decoder: TelemetryDecoder,
    dispatcher: Dispatcher,
    subscribed: Vec<TelemetryChannel>,
    snapshot: TelemetryRow,
    dirty: bool,
}

enum LoopEnd {
    ExitRequested,
    TransportFailure,
    StreamEnded,
}

impl Session {
    fn new(link: Box<dyn VehicleLink>) -> Self {
        Self {
            link,
            decoder: TelemetryDecoder::new(),
            dispatcher: Dispatcher::new(),
            subscribed: Vec::new(),
            snapshot: TelemetryRow::empty(now_ms()),
            dirty: false,
        }
    }

    fn subscribe_all(&mut self, sink: &mpsc::Sender<Notification>) -> bool {
        self.decoder.reset();
        for channel in TelemetryChannel::ALL {
            match self.link.subscribe(channel.uuid(), sink.clone()) {
                Ok(()) => self.subscribed.push(channel),
                Err(e) => {
                    tracing::error!(channel = channel.name(), error = %e, "subscribe failed");
                    return false;
                }
            }
        }
        tracing::info!("subscribed to notifications");
        true
    }

    fn handle_notification(&mut self, state: &AppState, notification: Notification) {
        let Some(channel) = TelemetryChannel::from_uuid(notification.channel) else {
            tracing::debug!(channel = %notification.channel, "notification on unknown channel");
            return;
        };

        match self.decoder.decode(channel, &notification.payload) {
            Ok(Some(reading)) => {
                match reading {
                    Reading::Accel(acc) => {
                        self.snapshot.accel_x = acc.x;
                        self.snapshot.accel_y = acc.y;
                        self.snapshot.accel_z = acc.z;
                        self.snapshot.speed = acc.speed;
                    }
                    Reading::Distance(m) => self.snapshot.distance_m = m,
                    Reading::Battery(pct) => self.snapshot.battery_pct = pct,
                }
                self.snapshot.timestamp_ms = now_ms();
                state.record(self.snapshot);
                self.dirty = true;
            }
            // Baseline-seeding frame: consumed, nothing to display.
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
        }
    }

    /// Returns how the loop should end, if it should.
    fn handle_key(&mut self, event: KeyEvent) -> Option<LoopEnd> {
        match self.dispatcher.handle(event)? {
            Dispatch::Shutdown => {
                tracing::info!("exit requested from dashboard");
                Some(LoopEnd::ExitRequested)
            }
            Dispatch::Command {
                command,
                engage,
                reset_speed,
            } => {
                let payload = if engage { CMD_ACTIVATE } else { CMD_DEACTIVATE };
                if let Err(e) = self.link.write(command.address(), &[payload]) {
                    tracing::error!(command = command.name(), error = %e, "command write failed");
                    return Some(LoopEnd::TransportFailure);
                }
                tracing::debug!(command = command.name(), engage, "command written");
                if reset_speed {
                    self.snapshot.speed = 0.0;
                    self.dirty = true;
                }
                None
            }
        }
    }

    fn flush(&mut self, state: &AppState) {
        if self.dirty {
            let _ = state.telemetry_tx.send(self.snapshot);
            self.dirty = false;
        }
    }

    fn teardown(&mut self, state: &AppState) {
        state.set_status(LinkStatus::Disconnecting);
        for channel in self.subscribed.drain(..) {
            if let Err(e) = self.link.unsubscribe(channel.uuid()) {
                tracing::warn!(channel = channel.name(), error = %e, "unsubscribe failed");
            }
        }
        tracing::info!("unsubscribed from notifications");
        if let Err(e) = self.link.disconnect() {
            tracing::warn!(error = %e, "disconnect failed");
        }
        state.set_status(LinkStatus::Disconnected);
        tracing::info!("disconnected");
    }
}

/// Run one session to completion. Ends on the exit key, a transport failure,
/// an external shutdown signal, or the notification stream closing.
pub async fn session_task(
    state: Arc<AppState>,
    link: Box<dyn VehicleLink>,
    notif_tx: mpsc::Sender<Notification>,
    mut notif_rx: mpsc::Receiver<Notification>,
    mut key_rx: mpsc::Receiver<KeyEvent>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut session = Session::new(link);

    state.set_status(LinkStatus::Connecting);
    if session.subscribe_all(&notif_tx) {
        state.set_status(LinkStatus::Connected);
        tracing::info!("connected");

        let mut redraw = interval(Duration::from_millis(REDRAW_PERIOD_MS));
        let end = loop {
            tokio::select! {
                notification = notif_rx.recv() => {
                    match notification {
                        Some(n) => session.handle_notification(&state, n),
                        None => break LoopEnd::StreamEnded,
                    }
                }
                event = key_rx.recv() => {
                    match event {
                        Some(ev) => {
                            if let Some(end) = session.handle_key(ev) {
                                break end;
                            }
                        }
                        None => break LoopEnd::StreamEnded,
                    }
                }
                _ = redraw.tick() => session.flush(&state),
                _ = shutdown_rx.recv() => break LoopEnd::ExitRequested,
            }
        };
        match end {
            LoopEnd::ExitRequested => tracing::info!("session ending"),
            LoopEnd::TransportFailure => tracing::error!("session lost the vehicle link"),
            LoopEnd::StreamEnded => tracing::warn!("event stream closed, session ending"),
        }
    }

    session.teardown(&state);
}
