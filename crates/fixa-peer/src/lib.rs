//! Session endpoints for the fixa protocol.
//!
//! A [`Device`] owns a [`fixa_registry::Registry`], announces it to whichever
//! controller connects, and applies the edits that come back. A
//! [`Controller`] mirrors what the device announced and sends edits,
//! coalesced so a burst of changes costs one message per throttle interval.

pub mod config;
pub mod controller;
pub mod device;
pub mod discovery;
pub mod error;
pub mod session;
pub mod throttle;

pub use config::{ControllerConfig, DeviceConfig, DEFAULT_THROTTLE_INTERVAL};
pub use controller::{Controller, ControllerEvent};
pub use device::{Device, DeviceSession, ListenerHandle};
pub use discovery::{ServiceRecord, SERVICE_TYPE, TXT_APP_NAME, TXT_DEVICE_NAME};
pub use error::{PeerError, Result};
pub use session::{SessionState, SessionStatus};
pub use throttle::FlushTimer;
