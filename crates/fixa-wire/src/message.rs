//! Message bodies carried by `RegisterFixables` and `UpdateFixables` frames.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::config::FixableConfig;
use crate::error::Result;
use crate::id::FixableId;
use crate::value::FixableValue;

/// Full snapshot a device sends when a controller connects.
///
/// `fixables` holds top-level entries in presentation order; group children
/// appear nested inside their group. `values` is flat and covers every entry
/// that holds a value, group children included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationMessage {
    pub stream_name: String,
    pub fixables: Vec<(FixableId, FixableConfig)>,
    pub values: BTreeMap<FixableId, FixableValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegistration {
    stream_name: String,
    fixables: Vec<(FixableId, Value)>,
    values: BTreeMap<FixableId, Value>,
}

impl RegistrationMessage {
    pub fn encode(&self) -> Result<Vec<u8>> {
        for (id, config) in &self.fixables {
            config.check_finite(id.as_str())?;
        }
        for (id, value) in &self.values {
            value.check_finite(id.as_str())?;
        }
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a registration body. Any malformed entry fails the whole body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let raw: RawRegistration = serde_json::from_slice(body)?;
        let fixables = raw
            .fixables
            .into_iter()
            .map(|(id, config)| Ok((id, FixableConfig::from_json_value(config)?)))
            .collect::<Result<Vec<_>>>()?;
        let values = decode_values(raw.values)?;
        trace!(
            stream = %raw.stream_name,
            fixables = fixables.len(),
            values = values.len(),
            "decoded registration"
        );
        Ok(Self {
            stream_name: raw.stream_name,
            fixables,
            values,
        })
    }

    /// Every declared entry, depth-first in presentation order, with group
    /// children following their group.
    pub fn flatten(&self) -> Vec<(&FixableId, &FixableConfig)> {
        fn walk<'a>(
            entries: &'a [(FixableId, FixableConfig)],
            out: &mut Vec<(&'a FixableId, &'a FixableConfig)>,
        ) {
            for (id, config) in entries {
                out.push((id, config));
                walk(config.children(), out);
            }
        }
        let mut out = Vec::new();
        walk(&self.fixables, &mut out);
        out
    }

    /// Look up a config by id anywhere in the tree.
    pub fn config(&self, id: &str) -> Option<&FixableConfig> {
        self.flatten()
            .into_iter()
            .find(|(entry, _)| entry.as_str() == id)
            .map(|(_, config)| config)
    }
}

/// A batch of changed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateMessage {
    pub updates: BTreeMap<FixableId, FixableValue>,
}

#[derive(Deserialize)]
struct RawUpdate {
    updates: BTreeMap<FixableId, Value>,
}

impl UpdateMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<FixableId>, value: FixableValue) {
        self.updates.insert(id.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        for (id, value) in &self.updates {
            value.check_finite(id.as_str())?;
        }
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode an update body. Nothing is returned unless every entry decodes.
    pub fn decode(body: &[u8]) -> Result<Self> {
        let raw: RawUpdate = serde_json::from_slice(body)?;
        Ok(Self {
            updates: decode_values(raw.updates)?,
        })
    }
}

impl<K: Into<FixableId>> FromIterator<(K, FixableValue)> for UpdateMessage {
    fn from_iter<I: IntoIterator<Item = (K, FixableValue)>>(iter: I) -> Self {
        Self {
            updates: iter.into_iter().map(|(id, value)| (id.into(), value)).collect(),
        }
    }
}

fn decode_values(raw: BTreeMap<FixableId, Value>) -> Result<BTreeMap<FixableId, FixableValue>> {
    raw.into_iter()
        .map(|(id, value)| Ok((id, FixableValue::from_json_value(value)?)))
        .collect()
}
