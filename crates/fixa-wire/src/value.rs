use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::color::Color;
use crate::config::FixableConfig;
use crate::error::{Result, WireError};
use crate::tagged;

/// The kind of value a fixable holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Float,
    Color,
}

impl ValueKind {
    /// Variant key used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Float => "float",
            Self::Color => "color",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The current value of one fixable. Carries no display metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixableValue {
    Bool(bool),
    Float(f32),
    Color(Color),
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum ValueRepr {
    Bool { value: bool },
    Float { value: f32 },
    Color { value: Color },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueRecord<T> {
    value: T,
}

impl Serialize for FixableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let repr = match *self {
            Self::Bool(value) => ValueRepr::Bool { value },
            Self::Float(value) => ValueRepr::Float { value },
            Self::Color(value) => ValueRepr::Color { value },
        };
        repr.serialize(serializer)
    }
}

impl FixableValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Float(_) => ValueKind::Float,
            Self::Color(_) => ValueKind::Color,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// Clamp into the range `config` advertises.
    ///
    /// The codec never clamps; this is for applications that want to enforce
    /// float bounds or color channel ranges after decode. Values whose kind
    /// does not match `config` are returned unchanged.
    pub fn clamped_to(self, config: &FixableConfig) -> Self {
        match (self, config) {
            (Self::Float(v), FixableConfig::Float { min, max, .. }) if min <= max => {
                Self::Float(v.clamp(*min, *max))
            }
            (Self::Color(c), FixableConfig::Color { .. }) => Self::Color(c.clamped()),
            (other, _) => other,
        }
    }

    /// Parse text as a value of `kind`: `true`/`false`, a decimal float, or
    /// `#rrggbb[aa]`.
    pub fn parse(kind: ValueKind, input: &str) -> Result<Self> {
        let text = input.trim();
        let invalid = || WireError::InvalidLiteral {
            kind: kind.name(),
            input: input.to_string(),
        };
        match kind {
            ValueKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(Self::Bool(true)),
                "false" | "off" | "0" => Ok(Self::Bool(false)),
                _ => Err(invalid()),
            },
            ValueKind::Float => text
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Self::Float)
                .ok_or_else(invalid),
            ValueKind::Color => Color::from_hex(text).map(Self::Color),
        }
    }

    /// Decode a tagged value container.
    pub fn from_json_value(value: Value) -> Result<Self> {
        let (variant, record) = tagged::split_variant(value)?;
        match variant.as_str() {
            "bool" => {
                let r: ValueRecord<bool> = tagged::record(&variant, record)?;
                Ok(Self::Bool(r.value))
            }
            "float" => {
                let r: ValueRecord<f32> = tagged::record(&variant, record)?;
                Ok(Self::Float(tagged::finite(r.value, &variant, "value")?))
            }
            "color" => {
                let r: ValueRecord<Color> = tagged::record(&variant, record)?;
                if !r.value.is_finite() {
                    return Err(WireError::malformed(variant, "channel is out of f32 range"));
                }
                Ok(Self::Color(r.value))
            }
            _ => Err(WireError::UnexpectedKey { key: variant }),
        }
    }

    /// Encode as a tagged value container.
    pub fn to_json_value(&self) -> Result<Value> {
        self.check_finite("value")?;
        Ok(serde_json::to_value(self)?)
    }

    /// Whether every float in the value is finite and so representable on
    /// the wire.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Bool(_) => true,
            Self::Float(v) => v.is_finite(),
            Self::Color(c) => c.is_finite(),
        }
    }

    pub(crate) fn check_finite(&self, context: &str) -> Result<()> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(WireError::NonFinite {
                context: context.to_string(),
            })
        }
    }
}

impl fmt::Display for FixableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Color(c) => write!(f, "{c}"),
        }
    }
}

impl From<bool> for FixableValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for FixableValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Color> for FixableValue {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}
