//! Validation error types.

use thiserror::Error;

/// A single constraint that a field failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Field is required but missing
    #[error("required field is missing")]
    Required,

    /// Field is not part of the closed object
    #[error("field is not allowed")]
    Unexpected,

    /// Value has the wrong JSON type
    #[error("expected {0}")]
    Type(&'static str),

    /// Hex string has the wrong length or alphabet
    #[error("expected {chars} lowercase hex characters")]
    Hex {
        /// Required number of hex characters
        chars: usize,
    },

    /// Integer is below its lower bound
    #[error("must be at least {0}")]
    Minimum(u64),

    /// Integer is above its upper bound
    #[error("must be at most {0}")]
    Maximum(u64),

    /// String is shorter than allowed
    #[error("must be at least {0} characters")]
    MinLength(usize),

    /// String is longer than allowed
    #[error("must be at most {0} characters")]
    MaxLength(usize),

    /// Array has too many items
    #[error("must have at most {0} items")]
    MaxItems(usize),

    /// Array contains duplicates
    #[error("items must be unique")]
    UniqueItems,

    /// String does not match a named format
    #[error("invalid {0} format")]
    Format(&'static str),

    /// Value is not the required constant
    #[error("must be {0:?}")]
    Const(&'static str),

    /// Value matches none of the shapes of a union
    #[error("must be one of: {0}")]
    OneOf(&'static str),

    /// Entry position and chain fields disagree
    #[error("{0}")]
    Position(Position),

    /// Typed value could not be turned into JSON
    #[error("cannot encode: {0}")]
    Encoding(String),
}

/// Rule linking an entry's `index` to its `prior` field
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Entry 0 carries `prior`
    #[error("prior is forbidden on the first entry")]
    PriorOnFirstEntry,

    /// A later entry lacks `prior`
    #[error("prior is required after the first entry")]
    MissingPrior,
}

/// A message failed schema validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid message at `{}`: {constraint}", display_path(.path))]
pub struct InvalidMessage {
    /// Dotted path to the failing field, empty for the root
    pub path: String,
    /// Which constraint failed
    pub constraint: Constraint,
}

impl InvalidMessage {
    /// Create a new validation error
    pub fn new(path: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            path: path.into(),
            constraint,
        }
    }

    /// The position rule broken, when this error concerns `index`/`prior`
    /// rather than shape
    pub fn position(&self) -> Option<Position> {
        match self.constraint {
            Constraint::Position(position) => Some(position),
            _ => None,
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}
