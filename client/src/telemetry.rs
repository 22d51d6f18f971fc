//! Decoding of the vehicle's fixed binary telemetry frames.
//!
//! The accelerometer stream is stateful: the first frame after (re)connect
//! seeds a per-axis zero offset and produces no reading. Every later frame
//! reports the delta from that offset. Distance and battery decode statelessly.

use std::error::Error;
use std::fmt;

use crate::protocol::{ACCEL_COUNT_TO_G, ACCEL_FRAME_LEN, DISTANCE_FRAME_LEN, TelemetryChannel};

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload length does not match the channel's fixed frame width.
    /// Indicates protocol drift on the vehicle side; callers log it.
    MalformedFrame {
        channel: TelemetryChannel,
        expected: usize,
        got: usize,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedFrame {
                channel,
                expected,
                got,
            } => write!(
                f,
                "malformed {} frame: expected {expected} bytes, got {got}",
                channel.name()
            ),
        }
    }
}

impl Error for DecodeError {}

/// Baseline-relative acceleration in g, plus instantaneous speed in cm/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccelReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Accel(AccelReading),
    /// Meters.
    Distance(f64),
    /// Percent, as reported; not range-checked.
    Battery(u64),
}

/// Truncate to 2 decimals toward negative infinity, then round to 1.
/// Matches the vehicle client's display math exactly, so baselines taken by
/// different station builds agree.
fn derive_axis(count: i16) -> f64 {
    let floored = (f64::from(count) * ACCEL_COUNT_TO_G * 100.0).floor() / 100.0;
    (floored * 10.0).round() / 10.0
}

fn i16_le(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Decoder for one connection's notification stream.
///
/// Owns the accelerometer zero offset: seeded exactly once, on the first
/// accelerometer frame after `new`/`reset`, and held until the next reset.
#[derive(Debug, Default)]
pub struct TelemetryDecoder {
    baseline: Option<[f64; 3]>,
}

impl TelemetryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rearm the baseline; called when a connection is (re)established.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Decode one notification payload. `Ok(None)` means the frame was
    /// consumed without producing a reading (the baseline-seeding frame).
    pub fn decode(
        &mut self,
        channel: TelemetryChannel,
        payload: &[u8],
    ) -> Result<Option<Reading>, DecodeError> {
        if let Some(expected) = channel.expected_len()
            && payload.len() != expected
        {
            return Err(DecodeError::MalformedFrame {
                channel,
                expected,
                got: payload.len(),
            });
        }

        match channel {
            TelemetryChannel::Accelerometer => Ok(self.decode_accel(payload)),
            TelemetryChannel::Distance => {
                debug_assert_eq!(payload.len(), DISTANCE_FRAME_LEN);
                let cm = i16_le(payload, 0);
                Ok(Some(Reading::Distance(f64::from(cm) / 100.0)))
            }
            TelemetryChannel::Battery => {
                // Big-endian, arbitrary width; anything past 64 bits keeps
                // the low 64. The vehicle sends a single percent byte.
                let pct = payload
                    .iter()
                    .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
                Ok(Some(Reading::Battery(pct)))
            }
        }
    }

    fn decode_accel(&mut self, payload: &[u8]) -> Option<Reading> {
        debug_assert_eq!(payload.len(), ACCEL_FRAME_LEN);
        let derived = [
            derive_axis(i16_le(payload, 0)),
            derive_axis(i16_le(payload, 2)),
            derive_axis(i16_le(payload, 4)),
        ];

        let Some(baseline) = self.baseline else {
            // First frame after connect: seed the zero offset, report nothing.
            self.baseline = Some(derived);
            return None;
        };

        let vel_x = f64::from(i16_le(payload, 6));
        let vel_y = f64::from(i16_le(payload, 8));
        Some(Reading::Accel(AccelReading {
            x: derived[0] - baseline[0],
            y: derived[1] - baseline[1],
            z: derived[2] - baseline[2],
            speed: vel_x.hypot(vel_y),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accel_frame(vals: [i16; 5]) -> Vec<u8> {
        vals.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn first_accel_frame_seeds_baseline_and_reports_nothing() {
        let mut dec = TelemetryDecoder::new();
        let out = dec
            .decode(
                TelemetryChannel::Accelerometer,
                &accel_frame([100, -50, 200, 30, 40]),
            )
            .unwrap();
        assert_eq!(out, None);
        assert_eq!(dec.baseline, Some([0.4, -0.2, 0.8]));
    }

    #[test]
    fn second_accel_frame_reports_delta_from_baseline() {
        let mut dec = TelemetryDecoder::new();
        dec.decode(
            TelemetryChannel::Accelerometer,
            &accel_frame([100, -50, 200, 30, 40]),
        )
        .unwrap();
        let out = dec
            .decode(
                TelemetryChannel::Accelerometer,
                &accel_frame([120, -50, 200, 30, 40]),
            )
            .unwrap();
        let Some(Reading::Accel(acc)) = out else {
            panic!("expected an accel reading, got {out:?}");
        };
        // 120 counts derives to 0.5 g; baseline was 0.4 g.
        assert!((acc.x - 0.1).abs() < 1e-9);
        assert_eq!(acc.y, 0.0);
        assert_eq!(acc.z, 0.0);
        assert_eq!(acc.speed, 50.0); // hypot(30, 40)
    }

    #[test]
    fn speed_comes_from_raw_velocity_counts() {
        let mut dec = TelemetryDecoder::new();
        dec.decode(
            TelemetryChannel::Accelerometer,
            &accel_frame([0, 0, 256, 999, 999]),
        )
        .unwrap();
        let out = dec
            .decode(
                TelemetryChannel::Accelerometer,
                &accel_frame([0, 0, 256, -3, 4]),
            )
            .unwrap();
        let Some(Reading::Accel(acc)) = out else {
            panic!("expected an accel reading");
        };
        // Velocity is never baseline-corrected.
        assert_eq!(acc.speed, 5.0);
    }

    #[test]
    fn malformed_accel_frame_is_rejected_without_touching_baseline() {
        let mut dec = TelemetryDecoder::new();
        let err = dec
            .decode(TelemetryChannel::Accelerometer, &[0u8; 9])
            .unwrap_err();
        assert_eq!(
            err,
            DecodeError::MalformedFrame {
                channel: TelemetryChannel::Accelerometer,
                expected: 10,
                got: 9,
            }
        );
        assert_eq!(dec.baseline, None);
    }

    #[test]
    fn reset_rearms_the_baseline() {
        let mut dec = TelemetryDecoder::new();
        dec.decode(
            TelemetryChannel::Accelerometer,
            &accel_frame([100, 0, 0, 0, 0]),
        )
        .unwrap();
        dec.reset();
        let out = dec
            .decode(
                TelemetryChannel::Accelerometer,
                &accel_frame([200, 0, 0, 0, 0]),
            )
            .unwrap();
        assert_eq!(out, None);
        assert_eq!(dec.baseline.unwrap()[0], 0.8);
    }

    #[test]
    fn distance_is_signed_centimeters_over_100() {
        let mut dec = TelemetryDecoder::new();
        let out = dec
            .decode(TelemetryChannel::Distance, &250i16.to_le_bytes())
            .unwrap();
        assert_eq!(out, Some(Reading::Distance(2.5)));

        let out = dec
            .decode(TelemetryChannel::Distance, &(-42i16).to_le_bytes())
            .unwrap();
        assert_eq!(out, Some(Reading::Distance(-0.42)));
    }

    #[test]
    fn distance_frame_must_be_two_bytes() {
        let mut dec = TelemetryDecoder::new();
        assert!(dec.decode(TelemetryChannel::Distance, &[1, 2, 3]).is_err());
        assert!(dec.decode(TelemetryChannel::Distance, &[]).is_err());
    }

    #[test]
    fn battery_is_big_endian_and_width_agnostic() {
        let mut dec = TelemetryDecoder::new();
        assert_eq!(
            dec.decode(TelemetryChannel::Battery, &[87]).unwrap(),
            Some(Reading::Battery(87))
        );
        assert_eq!(
            dec.decode(TelemetryChannel::Battery, &[0x01, 0x00]).unwrap(),
            Some(Reading::Battery(256))
        );
        // Empty payload reads as zero rather than failing.
        assert_eq!(
            dec.decode(TelemetryChannel::Battery, &[]).unwrap(),
            Some(Reading::Battery(0))
        );
    }

    #[test]
    fn axis_derivation_floors_then_rounds() {
        // floor(100 * 0.0039 * 100)/100 = 0.39, rounded to one decimal = 0.4
        assert_eq!(derive_axis(100), 0.4);
        assert_eq!(derive_axis(-50), -0.2);
        assert_eq!(derive_axis(200), 0.8);
        assert_eq!(derive_axis(0), 0.0);
    }
}
