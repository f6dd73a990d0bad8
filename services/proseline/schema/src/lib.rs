//! Typed, schema-validated proseline protocol messages.
//!
//! Every record owns its validation: [`Schema::parse_at`] checks a JSON
//! value against the record's closed shape and builds the typed value in one
//! pass, reporting the first failing field as an [`InvalidMessage`]. Outbound
//! values go back through the same check in [`Schema::to_value`], so both
//! directions enforce one schema.
//!
//! ## Records
//!
//! - [`Handshake`]: `{version}`
//! - [`Reference`]: `{publicKey, index}` for offers and requests
//! - [`LogEntry`] / [`LogEntryBody`]: the signed payload of an [`Envelope`]
//! - [`Invitation`] / [`Request`]: self-signed invitation profile messages

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod reference;
pub mod signed;
pub mod timestamp;

mod rules;

use serde::Serialize;
use serde_json::Value;

// Re-export main types
pub use entry::{Draft, Intro, LogEntry, LogEntryBody, Mark, MarkId, Note, Range, Reply};
pub use envelope::Envelope;
pub use error::{Constraint, InvalidMessage, Position};
pub use handshake::Handshake;
pub use reference::Reference;
pub use signed::{Invitation, InvitationMessage, Request, RequestMessage, Signed};
pub use timestamp::Timestamp;

/// A message record with a fixed, closed JSON shape.
pub trait Schema: Serialize + Sized {
    /// Validate `value` and build the typed record. `path` prefixes field
    /// names in errors; it is empty at the root.
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage>;

    /// Validate a root value
    fn parse(value: &Value) -> Result<Self, InvalidMessage> {
        Self::parse_at(value, "")
    }

    /// Serialize to JSON, checking the result against the same schema used
    /// for inbound values.
    fn to_value(&self) -> Result<Value, InvalidMessage> {
        let value = serde_json::to_value(self)
            .map_err(|e| InvalidMessage::new("", Constraint::Encoding(e.to_string())))?;
        Self::parse(&value)?;
        Ok(value)
    }

    /// Canonical bytes of the validated value, as signed and hashed.
    fn canonical_bytes(&self) -> Result<Vec<u8>, InvalidMessage> {
        proseline_wire::canonicalize(&self.to_value()?)
            .map_err(|e| InvalidMessage::new("", Constraint::Encoding(e.to_string())))
    }
}
