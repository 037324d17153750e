use fixa_wire::{FixableId, ValueKind};

/// Errors from declaring fixables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The id is already declared as a different variant.
    #[error("fixable {id} is already declared as {existing}, cannot redeclare as {requested}")]
    ConflictingDeclaration {
        id: FixableId,
        existing: &'static str,
        requested: &'static str,
    },

    /// The supplied initial value does not fit the config.
    #[error("initial value for {id} is {found}, but the config takes {}", describe(.expected))]
    ValueKindMismatch {
        id: FixableId,
        expected: Option<ValueKind>,
        found: ValueKind,
    },

    /// The id is used more than once in the flat id space.
    #[error("fixable id {id} is already used elsewhere")]
    DuplicateId { id: FixableId },
}

/// Errors from binding a handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("fixable {id} was never declared")]
    NotDeclared { id: FixableId },

    /// Dividers and groups carry no value.
    #[error("fixable {id} is a {variant} and holds no value")]
    NotBindable { id: FixableId, variant: &'static str },

    #[error("cannot bind a {requested} handle to {declared} fixable {id}")]
    TypeMismatch {
        id: FixableId,
        declared: ValueKind,
        requested: ValueKind,
    },
}

fn describe(kind: &Option<ValueKind>) -> &'static str {
    kind.map_or("no value", ValueKind::name)
}

pub type Result<T> = std::result::Result<T, RegistryError>;
