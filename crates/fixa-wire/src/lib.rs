//! Configuration/value model and message bodies for the fixa protocol.
//!
//! Every configuration and value is encoded as a single-key JSON object whose
//! key names the variant:
//!
//! ```text
//! {"float": {"min": 10.0, "max": 100.0, "display": {"label": "Size", "order": 0}}}
//! {"float": {"value": 50.0}}
//! ```
//!
//! Decoding is strict: exactly one recognized key must be present and the
//! variant record must match its schema exactly.

pub mod color;
pub mod config;
pub mod display;
pub mod error;
pub mod id;
pub mod manifest;
pub mod message;
mod tagged;
pub mod value;

pub use color::Color;
pub use config::FixableConfig;
pub use display::{FixableDisplay, UNORDERED};
pub use error::{Result, WireError};
pub use id::FixableId;
pub use manifest::{decode_manifest, encode_manifest, FixableSetup};
pub use message::{RegistrationMessage, UpdateMessage};
pub use value::{FixableValue, ValueKind};
