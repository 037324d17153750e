use serde::{Deserialize, Serialize};

/// Order assigned to fixables declared without one; sorts last.
pub const UNORDERED: i64 = i64::MAX;

/// Presentation metadata shared by every configuration variant.
///
/// Fixables are presented sorted by `(order, declaration sequence)`. Orders
/// need not be contiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixableDisplay {
    pub label: String,
    #[serde(default = "unordered")]
    pub order: i64,
}

fn unordered() -> i64 {
    UNORDERED
}

impl FixableDisplay {
    /// A display with the given label and no explicit order.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            order: UNORDERED,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Whether an explicit order was given.
    pub fn is_ordered(&self) -> bool {
        self.order != UNORDERED
    }
}
