use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::Color;
use crate::display::FixableDisplay;
use crate::error::{Result, WireError};
use crate::id::FixableId;
use crate::tagged;
use crate::value::{FixableValue, ValueKind};

/// The immutable shape of one fixable: its variant, bounds and display.
///
/// Serializes as a single-key container named after the variant, e.g.
/// `{"float": {"min": 0.0, "max": 1.0, "display": {...}}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixableConfig {
    Bool {
        display: FixableDisplay,
    },
    Float {
        min: f32,
        max: f32,
        display: FixableDisplay,
    },
    Color {
        display: FixableDisplay,
    },
    /// Presentation-only separator. Has no value.
    Divider {
        display: FixableDisplay,
    },
    /// Nested container. Has no value; children share the flat id space.
    Group {
        children: Vec<(FixableId, FixableConfig)>,
        display: FixableDisplay,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DisplayRecord {
    display: FixableDisplay,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FloatRecord {
    min: f32,
    max: f32,
    display: FixableDisplay,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupRecord {
    children: Vec<(FixableId, Value)>,
    display: FixableDisplay,
}

impl FixableConfig {
    pub fn bool(label: impl Into<String>) -> Self {
        Self::Bool {
            display: FixableDisplay::new(label),
        }
    }

    pub fn float(label: impl Into<String>, min: f32, max: f32) -> Self {
        Self::Float {
            min,
            max,
            display: FixableDisplay::new(label),
        }
    }

    pub fn color(label: impl Into<String>) -> Self {
        Self::Color {
            display: FixableDisplay::new(label),
        }
    }

    pub fn divider(label: impl Into<String>) -> Self {
        Self::Divider {
            display: FixableDisplay::new(label),
        }
    }

    pub fn group<I, K>(label: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = (K, FixableConfig)>,
        K: Into<FixableId>,
    {
        Self::Group {
            children: children
                .into_iter()
                .map(|(id, config)| (id.into(), config))
                .collect(),
            display: FixableDisplay::new(label),
        }
    }

    /// Set the presentation order.
    pub fn with_order(mut self, order: i64) -> Self {
        self.display_mut().order = order;
        self
    }

    pub fn display(&self) -> &FixableDisplay {
        match self {
            Self::Bool { display }
            | Self::Float { display, .. }
            | Self::Color { display }
            | Self::Divider { display }
            | Self::Group { display, .. } => display,
        }
    }

    pub fn display_mut(&mut self) -> &mut FixableDisplay {
        match self {
            Self::Bool { display }
            | Self::Float { display, .. }
            | Self::Color { display }
            | Self::Divider { display }
            | Self::Group { display, .. } => display,
        }
    }

    pub fn label(&self) -> &str {
        &self.display().label
    }

    pub fn order(&self) -> i64 {
        self.display().order
    }

    /// Variant key used on the wire.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Bool { .. } => "bool",
            Self::Float { .. } => "float",
            Self::Color { .. } => "color",
            Self::Divider { .. } => "divider",
            Self::Group { .. } => "group",
        }
    }

    /// Whether `other` is the same variant, ignoring fields.
    pub fn same_variant(&self, other: &FixableConfig) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The kind of value this fixable holds, or `None` for dividers and
    /// groups.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Bool { .. } => Some(ValueKind::Bool),
            Self::Float { .. } => Some(ValueKind::Float),
            Self::Color { .. } => Some(ValueKind::Color),
            Self::Divider { .. } | Self::Group { .. } => None,
        }
    }

    /// Value given to a declaration that does not supply one: `false`, the
    /// float's `min`, or opaque magenta.
    pub fn default_value(&self) -> Option<FixableValue> {
        match self {
            Self::Bool { .. } => Some(FixableValue::Bool(false)),
            Self::Float { min, .. } => Some(FixableValue::Float(*min)),
            Self::Color { .. } => Some(FixableValue::Color(Color::MAGENTA)),
            Self::Divider { .. } | Self::Group { .. } => None,
        }
    }

    /// Direct children of a group; empty for every other variant.
    pub fn children(&self) -> &[(FixableId, FixableConfig)] {
        match self {
            Self::Group { children, .. } => children,
            _ => &[],
        }
    }

    /// Decode a tagged config container, recursing into group children.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let (variant, record) = tagged::split_variant(value)?;
        match variant.as_str() {
            "bool" => {
                let r: DisplayRecord = tagged::record(&variant, record)?;
                Ok(Self::Bool { display: r.display })
            }
            "float" => {
                let r: FloatRecord = tagged::record(&variant, record)?;
                Ok(Self::Float {
                    min: tagged::finite(r.min, &variant, "min")?,
                    max: tagged::finite(r.max, &variant, "max")?,
                    display: r.display,
                })
            }
            "color" => {
                let r: DisplayRecord = tagged::record(&variant, record)?;
                Ok(Self::Color { display: r.display })
            }
            "divider" => {
                let r: DisplayRecord = tagged::record(&variant, record)?;
                Ok(Self::Divider { display: r.display })
            }
            "group" => {
                let r: GroupRecord = tagged::record(&variant, record)?;
                let children = r
                    .children
                    .into_iter()
                    .map(|(id, child)| Ok((id, Self::from_json_value(child)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Group {
                    children,
                    display: r.display,
                })
            }
            _ => Err(WireError::UnexpectedKey { key: variant }),
        }
    }

    /// Encode as a tagged config container.
    pub fn to_json_value(&self) -> Result<Value> {
        self.check_finite("config")?;
        Ok(serde_json::to_value(self)?)
    }

    pub(crate) fn check_finite(&self, context: &str) -> Result<()> {
        match self {
            Self::Float { min, max, .. } if !(min.is_finite() && max.is_finite()) => {
                Err(WireError::NonFinite {
                    context: context.to_string(),
                })
            }
            Self::Group { children, .. } => children
                .iter()
                .try_for_each(|(id, child)| child.check_finite(id.as_str())),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn roundtrip(config: &FixableConfig) -> FixableConfig {
        FixableConfig::from_json_value(config.to_json_value().unwrap()).unwrap()
    }

    #[test]
    fn float_wire_shape() {
        let size = FixableConfig::float("Size", 10.0, 100.0).with_order(0);
        assert_eq!(
            size.to_json_value().unwrap(),
            json!({"float": {"min": 10.0, "max": 100.0, "display": {"label": "Size", "order": 0}}})
        );
    }

    #[test]
    fn every_variant_roundtrips() {
        let configs = [
            FixableConfig::bool("Open").with_order(1),
            FixableConfig::float("Size", -1.5, 0.25),
            FixableConfig::color("Tint").with_order(-4),
            FixableConfig::divider("Advanced"),
            FixableConfig::group("Empty", Vec::<(FixableId, FixableConfig)>::new()),
        ];
        for config in &configs {
            assert_eq!(&roundtrip(config), config);
        }
    }

    #[test]
    fn nested_groups_roundtrip() {
        let mut config = FixableConfig::bool("Leaf");
        for depth in 0..6 {
            config = FixableConfig::group(
                format!("Level {depth}"),
                [
                    (format!("divider-{depth}"), FixableConfig::divider("-")),
                    (format!("level-{depth}"), config),
                ],
            )
            .with_order(depth);
        }
        assert_eq!(roundtrip(&config), config);
    }

    #[test]
    fn group_children_are_ordered_pairs() {
        let group = FixableConfig::group("Outer", [("Inner", FixableConfig::bool("Inner"))]);
        let json = group.to_json_value().unwrap();
        assert_eq!(json["group"]["children"][0][0], json!("Inner"));
        assert!(json["group"]["children"][0][1]["bool"].is_object());
        assert_eq!(group.children().len(), 1);
        assert!(FixableConfig::bool("x").children().is_empty());
    }

    #[test]
    fn kinds_and_defaults() {
        let size = FixableConfig::float("Size", 10.0, 100.0);
        assert_eq!(size.kind(), Some(ValueKind::Float));
        assert_eq!(size.default_value(), Some(FixableValue::Float(10.0)));
        assert_eq!(
            FixableConfig::bool("Open").default_value(),
            Some(FixableValue::Bool(false))
        );
        assert_eq!(
            FixableConfig::color("Tint").default_value(),
            Some(FixableValue::Color(Color::MAGENTA))
        );
        assert_eq!(FixableConfig::divider("-").kind(), None);
        assert_eq!(FixableConfig::divider("-").default_value(), None);
    }

    #[test]
    fn variant_comparison_ignores_fields() {
        let a = FixableConfig::float("A", 0.0, 1.0);
        let b = FixableConfig::float("B", 5.0, 9.0).with_order(2);
        assert!(a.same_variant(&b));
        assert!(!a.same_variant(&FixableConfig::bool("A")));
    }

    #[test]
    fn tag_exclusivity() {
        assert!(matches!(
            FixableConfig::from_json_value(json!({})),
            Err(WireError::EmptyContainer)
        ));
        assert!(matches!(
            FixableConfig::from_json_value(json!({"slider": {"display": {"label": "x"}}})),
            Err(WireError::UnexpectedKey { .. })
        ));
        assert!(matches!(
            FixableConfig::from_json_value(json!({
                "bool": {"display": {"label": "x"}},
                "color": {"display": {"label": "x"}}
            })),
            Err(WireError::MalformedVariant { .. })
        ));
    }

    #[test]
    fn malformed_records_are_rejected() {
        for input in [
            json!({"float": {"min": 0.0, "display": {"label": "x"}}}),
            json!({"float": {"min": 0.0, "max": "1", "display": {"label": "x"}}}),
            json!({"bool": {"display": {"label": "x"}, "value": true}}),
            json!({"divider": {}}),
            json!({"group": {"children": {}, "display": {"label": "x"}}}),
        ] {
            assert!(
                matches!(
                    FixableConfig::from_json_value(input.clone()),
                    Err(WireError::MalformedVariant { .. })
                ),
                "{input}"
            );
        }
    }

    #[test]
    fn bad_child_fails_whole_group() {
        let input = json!({"group": {
            "children": [["ok", {"bool": {"display": {"label": "ok"}}}], ["bad", {}]],
            "display": {"label": "g"}
        }});
        assert!(matches!(
            FixableConfig::from_json_value(input),
            Err(WireError::EmptyContainer)
        ));
    }

    #[test]
    fn non_finite_bounds_rejected_at_encode() {
        let nested = FixableConfig::group("g", [("x", FixableConfig::float("x", 0.0, f32::NAN))]);
        assert!(matches!(
            nested.to_json_value(),
            Err(WireError::NonFinite { context }) if context == "x"
        ));
    }
}
