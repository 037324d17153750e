//! Live-tunable values shared between a running program and a remote
//! controller.
//!
//! A program declares *fixables* (booleans, ranged floats, colors, plus
//! dividers and groups for layout) in a [`Registry`] and binds typed handles
//! to them. A [`Device`] announces the registry to a connected controller and
//! applies the edits it sends back; every bound handle sees the new value.
//!
//! # Crate Structure
//!
//! - [`transport`] - TCP and local stream transport
//! - [`frame`] - Type-tagged, length-prefixed framing
//! - [`wire`] - Fixable configs, values and message bodies
//! - [`registry`] - Process-wide registry and typed handles
//! - [`peer`] - Device and controller sessions (behind `peer` feature)
//!
//! ```
//! use fixa::{FixableConfig, FixableFloat, Registry};
//!
//! let registry = Registry::new();
//! registry
//!     .declare_with_value("Size", FixableConfig::float("Size", 10.0, 100.0), 50.0_f32)
//!     .unwrap();
//! let size: FixableFloat = registry.bind("Size");
//! assert_eq!(size.value(), 50.0);
//! ```

/// Re-export transport types.
pub mod transport {
    pub use fixa_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fixa_frame::*;
}

/// Re-export wire types.
pub mod wire {
    pub use fixa_wire::*;
}

/// Re-export registry types.
pub mod registry {
    pub use fixa_registry::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use fixa_peer::*;
}

pub use fixa_registry::{Fixable, FixableBool, FixableColor, FixableFloat, Registry};
pub use fixa_wire::{Color, FixableConfig, FixableId, FixableValue, ValueKind};

#[cfg(feature = "peer")]
pub use fixa_peer::{Controller, ControllerConfig, Device, DeviceConfig};
