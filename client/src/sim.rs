//! Simulated vehicle, used whenever no radio hardware is attached.
//!
//! Implements `VehicleLink` end-to-end: a driver task emits accelerometer,
//! distance, and battery notifications on the same cadence as the real
//! firmware, and command writes move a small kinematic model so the dashboard
//! reacts believably to the arrow keys.

use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};
use uuid::Uuid;

use crate::link::{LinkError, Notification, VehicleLink};
use crate::protocol::{
    CMD_ACTIVATE, DriveCommand, TelemetryChannel, UUID_NOTIFY_ACCEL, UUID_NOTIFY_BATTERY,
    UUID_NOTIFY_DISTANCE,
};

const ACCEL_PERIOD_MS: u64 = 25;
const DISTANCE_PERIOD_MS: u64 = 100;
const BATTERY_PERIOD_MS: u64 = 1_000;

/// Cruise speed while a drive key is held, cm/s.
const CRUISE_SPEED: f64 = 80.0;
/// Lateral drift while steering, cm/s.
const STEER_SPEED: f64 = 30.0;
/// Fraction of the velocity gap closed per accelerometer tick.
const VELOCITY_GAIN: f64 = 0.12;
/// Hard braking factor per tick while stop is engaged.
const BRAKE_FACTOR: f64 = 0.5;

/// Flat-and-level gravity on the Z axis, in accelerometer counts (1 g).
const GRAVITY_COUNTS: f64 = 256.0;

const WALL_DISTANCE_CM: f64 = 10.0;
const OPEN_DISTANCE_CM: f64 = 500.0;

enum Ctrl {
    Subscribe(Uuid, mpsc::Sender<Notification>),
    Unsubscribe(Uuid),
    Write(DriveCommand, bool),
    Disconnect,
}

/// Handle held by the session; the driver task owns all state.
pub struct SimVehicle {
    ctrl_tx: mpsc::UnboundedSender<Ctrl>,
}

impl SimVehicle {
    /// Spawn the driver task on the current runtime.
    pub fn connect() -> Self {
        let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(ctrl_rx));
        Self { ctrl_tx }
    }

    fn send(&self, msg: Ctrl) -> Result<(), LinkError> {
        self.ctrl_tx.send(msg).map_err(|_| LinkError::Closed)
    }
}

impl VehicleLink for SimVehicle {
    fn subscribe(
        &mut self,
        channel: Uuid,
        sink: mpsc::Sender<Notification>,
    ) -> Result<(), LinkError> {
        if TelemetryChannel::from_uuid(channel).is_none() {
            return Err(LinkError::UnknownChannel(channel));
        }
        self.send(Ctrl::Subscribe(channel, sink))
    }

    fn unsubscribe(&mut self, channel: Uuid) -> Result<(), LinkError> {
        if TelemetryChannel::from_uuid(channel).is_none() {
            return Err(LinkError::UnknownChannel(channel));
        }
        self.send(Ctrl::Unsubscribe(channel))
    }

    fn write(&mut self, address: Uuid, payload: &[u8]) -> Result<(), LinkError> {
        let Some(command) = DriveCommand::from_address(address) else {
            return Err(LinkError::UnknownAddress(address));
        };
        let engage = payload.first().copied() == Some(CMD_ACTIVATE);
        self.send(Ctrl::Write(command, engage))
    }

    fn disconnect(&mut self) -> Result<(), LinkError> {
        // Idempotent: a second disconnect finds the task gone and that's fine.
        let _ = self.ctrl_tx.send(Ctrl::Disconnect);
        Ok(())
    }
}

struct Motion {
    forward: bool,
    reverse: bool,
    steer_left: bool,
    steer_right: bool,
    stopping: bool,
    /// Longitudinal / lateral velocity, cm/s.
    vel_y: f64,
    vel_x: f64,
    distance_cm: f64,
    battery_pct: f64,
}

impl Motion {
    fn new() -> Self {
        Self {
            forward: false,
            reverse: false,
            steer_left: false,
            steer_right: false,
            stopping: false,
            vel_y: 0.0,
            vel_x: 0.0,
            distance_cm: OPEN_DISTANCE_CM * 0.8,
            battery_pct: 100.0,
        }
    }

    fn apply(&mut self, command: DriveCommand, engage: bool) {
        match command {
            DriveCommand::Forward => self.forward = engage,
            DriveCommand::Reverse => self.reverse = engage,
            DriveCommand::SteerLeft => self.steer_left = engage,
            DriveCommand::SteerRight => self.steer_right = engage,
            DriveCommand::Stop => self.stopping = engage,
        }
    }

    /// Advance one accelerometer tick; returns (dvx, dvy) for the frame.
    fn step(&mut self) -> (f64, f64) {
        let (prev_x, prev_y) = (self.vel_x, self.vel_y);

        if self.stopping {
            self.vel_x *= BRAKE_FACTOR;
            self.vel_y *= BRAKE_FACTOR;
        } else {
            let target_y = match (self.forward, self.reverse) {
                (true, false) => CRUISE_SPEED,
                (false, true) => -CRUISE_SPEED,
                _ => 0.0,
            };
            let target_x = match (self.steer_left, self.steer_right) {
                (true, false) => -STEER_SPEED,
                (false, true) => STEER_SPEED,
                _ => 0.0,
            };
            self.vel_y += (target_y - self.vel_y) * VELOCITY_GAIN;
            self.vel_x += (target_x - self.vel_x) * VELOCITY_GAIN;
        }

        // The wall stops forward progress.
        if self.distance_cm <= WALL_DISTANCE_CM && self.vel_y > 0.0 {
            self.vel_y = 0.0;
        }

        (self.vel_x - prev_x, self.vel_y - prev_y)
    }
}

/// dv per tick (cm/s) → accelerometer counts.
fn counts_from_dv(dv: f64) -> f64 {
    let cm_per_s2 = dv * (1_000.0 / ACCEL_PERIOD_MS as f64);
    let g = cm_per_s2 / 980.665;
    g / crate::protocol::ACCEL_COUNT_TO_G
}

fn clamp_i16(v: f64) -> i16 {
    v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

async fn drive(mut ctrl_rx: mpsc::UnboundedReceiver<Ctrl>) {
    let mut sinks: HashMap<Uuid, mpsc::Sender<Notification>> = HashMap::new();
    let mut motion = Motion::new();
    let mut rng = StdRng::from_os_rng();

    let mut accel_tick = interval(Duration::from_millis(ACCEL_PERIOD_MS));
    let mut distance_tick = interval(Duration::from_millis(DISTANCE_PERIOD_MS));
    let mut battery_tick = interval(Duration::from_millis(BATTERY_PERIOD_MS));

    loop {
        tokio::select! {
            ctrl = ctrl_rx.recv() => {
                match ctrl {
                    Some(Ctrl::Subscribe(channel, sink)) => {
                        sinks.insert(channel, sink);
                    }
                    Some(Ctrl::Unsubscribe(channel)) => {
                        sinks.remove(&channel);
                    }
                    Some(Ctrl::Write(command, engage)) => {
                        tracing::debug!(command = command.name(), engage, "sim vehicle command");
                        motion.apply(command, engage);
                    }
                    Some(Ctrl::Disconnect) | None => break,
                }
            }
            _ = accel_tick.tick() => {
                let (dvx, dvy) = motion.step();
                let frame: Vec<u8> = [
                    clamp_i16(counts_from_dv(dvx) + rng.random_range(-3.0..3.0)),
                    clamp_i16(counts_from_dv(dvy) + rng.random_range(-3.0..3.0)),
                    clamp_i16(GRAVITY_COUNTS + rng.random_range(-2.0..2.0)),
                    clamp_i16(motion.vel_x),
                    clamp_i16(motion.vel_y),
                ]
                .iter()
                .flat_map(|v| v.to_le_bytes())
                .collect();
                emit(&mut sinks, UUID_NOTIFY_ACCEL, frame);
            }
            _ = distance_tick.tick() => {
                let dt = DISTANCE_PERIOD_MS as f64 / 1_000.0;
                motion.distance_cm = (motion.distance_cm - motion.vel_y * dt)
                    .clamp(WALL_DISTANCE_CM, OPEN_DISTANCE_CM);
                let frame = (motion.distance_cm.round() as i16).to_le_bytes().to_vec();
                emit(&mut sinks, UUID_NOTIFY_DISTANCE, frame);
            }
            _ = battery_tick.tick() => {
                let moving = motion.vel_x.abs() + motion.vel_y.abs() > 1.0;
                motion.battery_pct =
                    (motion.battery_pct - if moving { 0.05 } else { 0.01 }).max(0.0);
                emit(
                    &mut sinks,
                    UUID_NOTIFY_BATTERY,
                    vec![motion.battery_pct.round() as u8],
                );
            }
        }
    }
    tracing::debug!("sim vehicle task stopped");
}

/// Non-blocking fan-out; a full or closed sink just drops the frame, the
/// session must never be stalled by the producer side.
fn emit(sinks: &mut HashMap<Uuid, mpsc::Sender<Notification>>, channel: Uuid, payload: Vec<u8>) {
    let Some(sink) = sinks.get(&channel) else {
        return;
    };
    if sink.try_send(Notification { channel, payload }).is_ok() {
        return;
    }
    if sink.is_closed() {
        sinks.remove(&channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifies_on_subscribed_channels() {
        let mut sim = SimVehicle::connect();
        let (tx, mut rx) = mpsc::channel(64);
        sim.subscribe(UUID_NOTIFY_ACCEL, tx).unwrap();

        let n = rx.recv().await.expect("accel frame");
        assert_eq!(n.channel, UUID_NOTIFY_ACCEL);
        assert_eq!(n.payload.len(), crate::protocol::ACCEL_FRAME_LEN);

        sim.disconnect().unwrap();
    }

    #[tokio::test]
    async fn rejects_unknown_addresses() {
        let mut sim = SimVehicle::connect();
        let bogus = Uuid::from_u128(0xdead_beef);
        assert_eq!(
            sim.write(bogus, &[CMD_ACTIVATE]),
            Err(LinkError::UnknownAddress(bogus))
        );
        assert_eq!(
            sim.subscribe(bogus, mpsc::channel(1).0),
            Err(LinkError::UnknownChannel(bogus))
        );
        sim.disconnect().unwrap();
    }

    #[tokio::test]
    async fn forward_command_builds_speed() {
        let mut sim = SimVehicle::connect();
        let (tx, mut rx) = mpsc::channel(256);
        sim.subscribe(UUID_NOTIFY_ACCEL, tx).unwrap();
        sim.write(DriveCommand::Forward.address(), &[CMD_ACTIVATE])
            .unwrap();

        // Velocity field is the 5th i16; wait for it to move.
        let mut vel_y = 0i16;
        for _ in 0..200 {
            let n = rx.recv().await.expect("accel frame");
            vel_y = i16::from_le_bytes([n.payload[8], n.payload[9]]);
            if vel_y > 10 {
                break;
            }
        }
        assert!(vel_y > 10, "vehicle never sped up (vel_y={vel_y})");
        sim.disconnect().unwrap();
    }
}
