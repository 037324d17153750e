//! Declarations loaded from a JSON manifest.
//!
//! A manifest is an array of entries:
//!
//! ```text
//! [
//!   {"id": "Size", "config": {"float": {"min": 10.0, "max": 100.0, "display": {"label": "Size"}}},
//!    "value": {"float": {"value": 50.0}}},
//!   {"id": "Open", "config": {"bool": {"display": {"label": "Open"}}}}
//! ]
//! ```
//!
//! `value` is optional; configs and values use the same tagged encoding as
//! messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FixableConfig;
use crate::error::{Result, WireError};
use crate::id::FixableId;
use crate::value::FixableValue;

/// One declaration: an id, its config and an optional initial value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixableSetup {
    pub id: FixableId,
    pub config: FixableConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<FixableValue>,
}

impl FixableSetup {
    pub fn new(id: impl Into<FixableId>, config: FixableConfig) -> Self {
        Self {
            id: id.into(),
            config,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<FixableValue>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSetup {
    id: FixableId,
    config: Value,
    #[serde(default)]
    value: Option<Value>,
}

/// Decode a manifest. The first bad entry fails the whole manifest.
pub fn decode_manifest(bytes: &[u8]) -> Result<Vec<FixableSetup>> {
    let raw: Vec<RawSetup> = serde_json::from_slice(bytes)?;
    raw.into_iter()
        .map(|entry| {
            let config = FixableConfig::from_json_value(entry.config).map_err(|err| {
                WireError::malformed(entry.id.as_str(), format!("config: {err}"))
            })?;
            let value = entry
                .value
                .map(FixableValue::from_json_value)
                .transpose()
                .map_err(|err| WireError::malformed(entry.id.as_str(), format!("value: {err}")))?;
            Ok(FixableSetup {
                id: entry.id,
                config,
                value,
            })
        })
        .collect()
}

/// Encode setups as a manifest.
pub fn encode_manifest(setups: &[FixableSetup]) -> Result<Vec<u8>> {
    for setup in setups {
        setup.config.check_finite(setup.id.as_str())?;
        if let Some(value) = &setup.value {
            value.check_finite(setup.id.as_str())?;
        }
    }
    Ok(serde_json::to_vec_pretty(setups)?)
}
