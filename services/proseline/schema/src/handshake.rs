//! Handshake message, the first frame in each direction.

use serde::Serialize;
use serde_json::Value;

use crate::rules::{self, Fields};
use crate::{InvalidMessage, Schema};

/// `{version}`: the sender's protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Handshake {
    /// Protocol version, at least 1
    pub version: u64,
}

impl Handshake {
    /// Create a handshake advertising `version`
    pub fn new(version: u64) -> Self {
        Self { version }
    }
}

impl Schema for Handshake {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["version"])?;
        Ok(Self {
            version: fields.field("version", |v, p| rules::integer(v, p, 1))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Constraint;
    use serde_json::json;

    #[test]
    fn test_handshake_shape() {
        assert_eq!(Handshake::parse(&json!({"version": 2})).unwrap(), Handshake::new(2));
        assert_eq!(
            Handshake::parse(&json!({"version": 0})).unwrap_err(),
            InvalidMessage::new("version", Constraint::Minimum(1))
        );
        assert_eq!(
            Handshake::parse(&json!({})).unwrap_err(),
            InvalidMessage::new("version", Constraint::Required)
        );
        assert_eq!(
            Handshake::parse(&json!({"version": 1, "extra": true})).unwrap_err(),
            InvalidMessage::new("extra", Constraint::Unexpected)
        );
    }
}
