//! Fixed identifiers and frame geometry for the vehicle's GATT-style profile.
//!
//! The vehicle exposes five writable command characteristics (one per motion
//! command, toggled with a single on/off byte) and three notify characteristics
//! (accelerometer, distance, battery). All identifiers are bound at build time.

use uuid::Uuid;

/// Drive command characteristics (write, one byte).
pub const UUID_CMD_FORWARD: Uuid = Uuid::from_u128(0x85fc567f_31d9_4185_87c6_339924d1c5be);
pub const UUID_CMD_REVERSE: Uuid = Uuid::from_u128(0x85fc5680_31d9_4185_87c6_339924d1c5be);
pub const UUID_CMD_STEER_LEFT: Uuid = Uuid::from_u128(0x85fc5681_31d9_4185_87c6_339924d1c5be);
pub const UUID_CMD_STEER_RIGHT: Uuid = Uuid::from_u128(0x85fc5682_31d9_4185_87c6_339924d1c5be);
pub const UUID_CMD_STOP: Uuid = Uuid::from_u128(0x85fc5683_31d9_4185_87c6_339924d1c5be);

/// Telemetry characteristics (notify).
pub const UUID_NOTIFY_ACCEL: Uuid = Uuid::from_u128(0x85fc567e_31d9_4185_87c6_339924d1c5be);
pub const UUID_NOTIFY_DISTANCE: Uuid = Uuid::from_u128(0x85fc5684_31d9_4185_87c6_339924d1c5be);
/// Standard Battery Level characteristic.
pub const UUID_NOTIFY_BATTERY: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Command payload bytes.
pub const CMD_ACTIVATE: u8 = 0x01;
pub const CMD_DEACTIVATE: u8 = 0x00;

/// Accelerometer frame: 5 little-endian i16 fields
/// (raw X/Y/Z acceleration counts, then X/Y velocity in cm/s).
pub const ACCEL_FRAME_LEN: usize = 10;
/// Distance frame: 1 little-endian i16, centimeters.
pub const DISTANCE_FRAME_LEN: usize = 2;

/// Accelerometer count-to-g conversion (±2 g range, 3.9 mg per count).
pub const ACCEL_COUNT_TO_G: f64 = 0.0039;

/// The five motion commands the operator can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveCommand {
    Forward,
    Reverse,
    SteerLeft,
    SteerRight,
    Stop,
}

impl DriveCommand {
    pub const ALL: [DriveCommand; 5] = [
        DriveCommand::Forward,
        DriveCommand::Reverse,
        DriveCommand::SteerLeft,
        DriveCommand::SteerRight,
        DriveCommand::Stop,
    ];

    /// Characteristic this command is written to.
    pub fn address(self) -> Uuid {
        match self {
            DriveCommand::Forward => UUID_CMD_FORWARD,
            DriveCommand::Reverse => UUID_CMD_REVERSE,
            DriveCommand::SteerLeft => UUID_CMD_STEER_LEFT,
            DriveCommand::SteerRight => UUID_CMD_STEER_RIGHT,
            DriveCommand::Stop => UUID_CMD_STOP,
        }
    }

    pub fn from_address(addr: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.address() == addr)
    }

    pub fn name(self) -> &'static str {
        match self {
            DriveCommand::Forward => "forward",
            DriveCommand::Reverse => "reverse",
            DriveCommand::SteerLeft => "steer_left",
            DriveCommand::SteerRight => "steer_right",
            DriveCommand::Stop => "stop",
        }
    }
}

/// Notification channels the session subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryChannel {
    Accelerometer,
    Distance,
    Battery,
}

impl TelemetryChannel {
    pub const ALL: [TelemetryChannel; 3] = [
        TelemetryChannel::Accelerometer,
        TelemetryChannel::Distance,
        TelemetryChannel::Battery,
    ];

    pub fn uuid(self) -> Uuid {
        match self {
            TelemetryChannel::Accelerometer => UUID_NOTIFY_ACCEL,
            TelemetryChannel::Distance => UUID_NOTIFY_DISTANCE,
            TelemetryChannel::Battery => UUID_NOTIFY_BATTERY,
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|ch| ch.uuid() == uuid)
    }

    /// Fixed payload width, if this channel has one. Battery is variable.
    pub fn expected_len(self) -> Option<usize> {
        match self {
            TelemetryChannel::Accelerometer => Some(ACCEL_FRAME_LEN),
            TelemetryChannel::Distance => Some(DISTANCE_FRAME_LEN),
            TelemetryChannel::Battery => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TelemetryChannel::Accelerometer => "accelerometer",
            TelemetryChannel::Distance => "distance",
            TelemetryChannel::Battery => "battery",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_addresses_are_distinct() {
        for a in DriveCommand::ALL {
            for b in DriveCommand::ALL {
                if a != b {
                    assert_ne!(a.address(), b.address());
                }
            }
        }
    }

    #[test]
    fn address_roundtrip() {
        for cmd in DriveCommand::ALL {
            assert_eq!(DriveCommand::from_address(cmd.address()), Some(cmd));
        }
        assert_eq!(DriveCommand::from_address(UUID_NOTIFY_ACCEL), None);
    }

    #[test]
    fn channel_roundtrip() {
        for ch in TelemetryChannel::ALL {
            assert_eq!(TelemetryChannel::from_uuid(ch.uuid()), Some(ch));
        }
        assert_eq!(TelemetryChannel::from_uuid(UUID_CMD_STOP), None);
    }
}
