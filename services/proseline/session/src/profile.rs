//! Protocol profiles: the tag set, schemas, and encryption policy that one
//! engine instance speaks.

use std::fmt;

use proseline_crypto::SessionCipher;
use proseline_schema::{Constraint, InvalidMessage, Schema};
use proseline_wire::TaggedMessage;
use serde_json::Value;

use crate::error::Rejection;

/// A protocol instantiation driven by [`crate::Session`]
pub trait Profile: Send + Sync + 'static {
    /// Typed messages carried after the handshake
    type Message: fmt::Debug + Send + 'static;

    /// Profile name used in logs
    const NAME: &'static str;

    /// Protocol version exchanged in the handshake
    const VERSION: u64;

    /// Whether `tag` names a non-handshake message of this profile
    fn is_known(tag: u64) -> bool;

    /// Payload cipher, when the profile encrypts its frames
    fn cipher(&self) -> Option<&SessionCipher>;

    /// Validate an outbound message and tag it
    fn encode(&self, message: &Self::Message) -> Result<TaggedMessage, Rejection>;

    /// Validate and verify an inbound body carried under a known tag
    fn accept(&self, tag: u64, body: &Value) -> Result<Self::Message, Rejection>;
}

/// Tag a validated record
pub(crate) fn tagged<T: Schema>(tag: u64, record: &T) -> Result<TaggedMessage, InvalidMessage> {
    match record.to_value()? {
        Value::Object(body) => Ok(TaggedMessage::new(tag, body)),
        _ => Err(InvalidMessage::new("", Constraint::Type("object"))),
    }
}
