//! Registry of declared fixables and the typed handles bound to them.
//!
//! A [`Registry`] maps each [`FixableId`](fixa_wire::FixableId) to its
//! config, its current value and the live [`Fixable`] handles bound to it.
//! Applying a value updates every live handle before `apply` returns.
//!
//! ```
//! use fixa_registry::{FixableFloat, Registry};
//! use fixa_wire::{FixableConfig, FixableValue};
//!
//! let registry = Registry::new();
//! registry.declare("Size", FixableConfig::float("Size", 10.0, 100.0)).unwrap();
//!
//! let size: FixableFloat = registry.bind("Size");
//! assert_eq!(size.value(), 10.0);
//!
//! registry.apply("Size", FixableValue::Float(42.0));
//! assert_eq!(size.value(), 42.0);
//! ```

pub mod error;
pub mod handle;
pub mod registry;

pub use error::{BindError, RegistryError, Result};
pub use handle::{Fixable, FixableBool, FixableColor, FixableFloat, FixableType};
pub use registry::{ApplyOutcome, Registry};
