/// Errors that can occur while encoding or decoding fixa message bodies.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A tagged container had no variant key.
    #[error("empty variant container")]
    EmptyContainer,

    /// A tagged container named a variant this codec does not know.
    #[error("unexpected variant key {key:?}")]
    UnexpectedKey { key: String },

    /// The container or its variant record does not have the required shape.
    #[error("malformed {variant} variant: {reason}")]
    MalformedVariant { variant: String, reason: String },

    /// A float that JSON cannot represent (NaN or infinite).
    #[error("non-finite float in {context}")]
    NonFinite { context: String },

    /// A color string that is not `#rrggbb` or `#rrggbbaa`.
    #[error("invalid color {0:?} (expected #rrggbb or #rrggbbaa)")]
    InvalidColor(String),

    /// Text that does not parse as a value of the expected kind.
    #[error("invalid {kind} literal {input:?}")]
    InvalidLiteral { kind: &'static str, input: String },

    /// The body is not valid JSON or the envelope has the wrong shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WireError {
    pub(crate) fn malformed(variant: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedVariant {
            variant: variant.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
