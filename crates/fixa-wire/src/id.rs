use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one fixable.
///
/// Unique within a device's flat identifier space, group children included.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixableId(String);

impl FixableId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for FixableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FixableId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FixableId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&FixableId> for FixableId {
    fn from(id: &FixableId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for FixableId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for FixableId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for FixableId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for FixableId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
