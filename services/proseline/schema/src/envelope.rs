//! Envelopes: log entries with the author's signature and the project's
//! authorization.

use proseline_crypto::{Keypair, PublicKey, Signature};
use serde::Serialize;
use serde_json::Value;

use crate::rules::{self, Fields};
use crate::{InvalidMessage, LogEntry, Schema};

/// A log entry signed twice over its canonical bytes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// The signed entry
    pub message: LogEntry,
    /// Public key of the log
    pub public_key: PublicKey,
    /// Signature with the log's secret key
    pub signature: Signature,
    /// Signature with the project's write key
    pub authorization: Signature,
}

impl Envelope {
    /// Sign `message` with the log keypair and authorize it with the
    /// project write keypair.
    pub fn seal(
        message: LogEntry,
        log: &Keypair,
        project: &Keypair,
    ) -> Result<Self, InvalidMessage> {
        let bytes = message.canonical_bytes()?;
        Ok(Self {
            public_key: log.public_key(),
            signature: log.sign(&bytes),
            authorization: project.sign(&bytes),
            message,
        })
    }

    /// Bytes covered by both `signature` and `authorization`
    pub fn signing_bytes(&self) -> Result<Vec<u8>, InvalidMessage> {
        self.message.canonical_bytes()
    }
}

impl Schema for Envelope {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(
            value,
            path,
            &["message", "publicKey", "signature", "authorization"],
        )?;
        Ok(Self {
            message: fields.field("message", LogEntry::parse_at)?,
            public_key: fields.field("publicKey", rules::hex)?,
            signature: fields.field("signature", rules::hex)?,
            authorization: fields.field("authorization", rules::hex)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constraint, Intro, LogEntryBody, Timestamp};
    use proseline_crypto::{verify, Digest};
    use serde_json::json;

    fn entry() -> LogEntry {
        LogEntry::first(
            Digest::from_bytes([5; 32]),
            LogEntryBody::Intro(Intro {
                name: "alice".into(),
                device: "laptop".into(),
                timestamp: Timestamp::now(),
            }),
        )
    }

    #[test]
    fn test_seal_signs_and_authorizes() {
        let log = Keypair::generate();
        let project = Keypair::generate();
        let envelope = Envelope::seal(entry(), &log, &project).unwrap();
        let bytes = envelope.signing_bytes().unwrap();
        verify(&log.public_key(), &bytes, &envelope.signature).unwrap();
        verify(&project.public_key(), &bytes, &envelope.authorization).unwrap();
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope::seal(entry(), &Keypair::generate(), &Keypair::generate()).unwrap();
        let value = envelope.to_value().unwrap();
        assert_eq!(Envelope::parse(&value).unwrap(), envelope);
    }

    #[test]
    fn test_envelope_paths() {
        let envelope = Envelope::seal(entry(), &Keypair::generate(), &Keypair::generate()).unwrap();
        let mut value = envelope.to_value().unwrap();
        value["message"]["body"]["device"] = json!("");
        assert_eq!(
            Envelope::parse(&value).unwrap_err(),
            InvalidMessage::new("message.body.device", Constraint::MinLength(1))
        );

        let mut value = envelope.to_value().unwrap();
        value["authorization"] = json!("00");
        assert_eq!(
            Envelope::parse(&value).unwrap_err(),
            InvalidMessage::new("authorization", Constraint::Hex { chars: 128 })
        );
    }
}
