//! Transport abstraction between the station and the vehicle.
//!
//! A `VehicleLink` hides the wireless stack behind four operations:
//! subscribe/unsubscribe a notify characteristic, write a command
//! characteristic, and disconnect. Notifications are not delivered through
//! callbacks; the link pushes them into an mpsc sink owned by the session, so
//! every frame funnels through one consumer loop.

use std::error::Error;
use std::fmt;

use tokio::sync::mpsc;
use uuid::Uuid;

/// One pushed notification, tagged with its source characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: Uuid,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The transport is gone. Fatal to the session; no retries.
    Closed,
    /// Write to a characteristic the device does not expose.
    UnknownAddress(Uuid),
    /// Subscribe/unsubscribe on a characteristic that cannot notify.
    UnknownChannel(Uuid),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Closed => write!(f, "link closed"),
            LinkError::UnknownAddress(addr) => write!(f, "no writable characteristic {addr}"),
            LinkError::UnknownChannel(ch) => write!(f, "no notify characteristic {ch}"),
        }
    }
}

impl Error for LinkError {}

/// A connected vehicle. Implementations must not block: `write` either
/// queues the payload or fails, and notifications arrive on the subscribed
/// sink as the device produces them.
pub trait VehicleLink: Send {
    /// Route notifications from `channel` into `sink`.
    fn subscribe(
        &mut self,
        channel: Uuid,
        sink: mpsc::Sender<Notification>,
    ) -> Result<(), LinkError>;

    fn unsubscribe(&mut self, channel: Uuid) -> Result<(), LinkError>;

    /// Write a command payload to `address`.
    fn write(&mut self, address: Uuid, payload: &[u8]) -> Result<(), LinkError>;

    /// Tear the connection down. Idempotent.
    fn disconnect(&mut self) -> Result<(), LinkError>;
}
