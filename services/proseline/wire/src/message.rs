//! Tagged messages: the `[tag, body]` JSON pair carried by each frame.

use crate::WireError;
use serde_json::{Map, Value};

/// Tag reserved for the handshake in every profile
pub const HANDSHAKE_TAG: u64 = 0;

/// A message type tag paired with its JSON object body
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedMessage {
    /// Profile-specific message type
    pub tag: u64,
    /// Message body
    pub body: Map<String, Value>,
}

impl TaggedMessage {
    /// Create a tagged message
    pub fn new(tag: u64, body: Map<String, Value>) -> Self {
        Self { tag, body }
    }

    /// Serialize to the UTF-8 JSON payload of one frame
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let pair = (self.tag, &self.body);
        Ok(serde_json::to_vec(&pair)?)
    }

    /// Parse a frame payload.
    ///
    /// The payload must be a two-element JSON array whose first element is
    /// a non-negative integer and whose second is an object.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let value: Value = serde_json::from_slice(payload)?;
        let Value::Array(items) = value else {
            return Err(WireError::Malformed("expected a [tag, body] array"));
        };
        let [tag, body]: [Value; 2] = items
            .try_into()
            .map_err(|_| WireError::Malformed("expected exactly two elements"))?;
        let tag = tag
            .as_u64()
            .ok_or(WireError::Malformed("tag is not a non-negative integer"))?;
        let Value::Object(body) = body else {
            return Err(WireError::Malformed("body is not an object"));
        };
        Ok(Self { tag, body })
    }
}
