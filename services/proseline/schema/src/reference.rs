//! References to log entries, exchanged in offers and requests.

use proseline_crypto::PublicKey;
use serde::Serialize;
use serde_json::Value;

use crate::rules::{self, Fields};
use crate::{InvalidMessage, Schema};

/// Points at one log entry by log public key and position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Public key of the log
    pub public_key: PublicKey,
    /// Position of the entry in the log
    pub index: u64,
}

impl Reference {
    /// Create a reference
    pub fn new(public_key: PublicKey, index: u64) -> Self {
        Self { public_key, index }
    }
}

impl Schema for Reference {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["publicKey", "index"])?;
        Ok(Self {
            public_key: fields.field("publicKey", rules::hex)?,
            index: fields.field("index", |v, p| rules::integer(v, p, 0))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Constraint;
    use serde_json::json;

    #[test]
    fn test_reference_round_trip() {
        let reference = Reference::new(PublicKey::from_bytes([0xaa; 32]), 7);
        let value = reference.to_value().unwrap();
        assert_eq!(value, json!({"publicKey": "aa".repeat(32), "index": 7}));
        assert_eq!(Reference::parse(&value).unwrap(), reference);
    }

    #[test]
    fn test_reference_constraints() {
        let key = "aa".repeat(32);
        assert_eq!(
            Reference::parse(&json!({"publicKey": key, "index": -1})).unwrap_err(),
            InvalidMessage::new("index", Constraint::Minimum(0))
        );
        assert_eq!(
            Reference::parse(&json!({"publicKey": "AA".repeat(32), "index": 0})).unwrap_err(),
            InvalidMessage::new("publicKey", Constraint::Hex { chars: 64 })
        );
        assert_eq!(
            Reference::parse(&json!({"publicKey": key})).unwrap_err(),
            InvalidMessage::new("index", Constraint::Required)
        );
    }
}
