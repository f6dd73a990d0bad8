//! Self-signed messages of the invitation profile.

use proseline_crypto::{
    discovery_key, verify, CryptoError, Digest, Keypair, PublicKey, ReplicationKey, Seed,
    Signature,
};
use serde::Serialize;
use serde_json::Value;

use crate::rules::{self, Fields};
use crate::{InvalidMessage, Schema, Timestamp};

/// A message together with its signer's public key and detached signature
/// over the message's canonical bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signed<M> {
    /// The signed message
    pub message: M,
    /// Signer's public key
    pub public_key: PublicKey,
    /// Signature over `canonicalize(message)`
    pub signature: Signature,
}

impl<M: Schema> Signed<M> {
    /// Validate and sign `message`
    pub fn seal(message: M, keypair: &Keypair) -> Result<Self, InvalidMessage> {
        let signature = keypair.sign(&message.canonical_bytes()?);
        Ok(Self {
            message,
            public_key: keypair.public_key(),
            signature,
        })
    }

    /// Check `signature` against `public_key`
    pub fn verify(&self) -> Result<(), CryptoError> {
        // A message that no longer validates cannot carry a good signature.
        let bytes = self
            .message
            .canonical_bytes()
            .map_err(|_| CryptoError::BadSignature)?;
        verify(&self.public_key, &bytes, &self.signature)
    }
}

impl<M: Schema> Schema for Signed<M> {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["message", "publicKey", "signature"])?;
        Ok(Self {
            message: fields.field("message", M::parse_at)?,
            public_key: fields.field("publicKey", rules::hex)?,
            signature: fields.field("signature", rules::hex)?,
        })
    }
}

/// Invitation to join a project
pub type Invitation = Signed<InvitationMessage>;

/// Request to be invited to a project
pub type Request = Signed<RequestMessage>;

/// Secrets needed to join a project
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationMessage {
    /// Symmetric key encrypting replication sessions
    pub replication_key: ReplicationKey,
    /// Seed of the project write keypair; only given to writers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_seed: Option<Seed>,
    /// Project title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl InvitationMessage {
    /// Project write keypair, when the invitation grants write access
    pub fn write_keypair(&self) -> Option<Keypair> {
        self.write_seed.as_ref().map(Keypair::from_seed)
    }

    /// Discovery key of the project
    pub fn discovery_key(&self) -> Digest {
        discovery_key(&self.replication_key)
    }
}

impl Schema for InvitationMessage {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["replicationKey", "writeSeed", "title"])?;
        Ok(Self {
            replication_key: fields.field("replicationKey", rules::hex)?,
            write_seed: fields.optional("writeSeed", rules::hex)?,
            title: fields.optional("title", |v, p| rules::text(v, p, 1, None))?,
        })
    }
}

/// Plaintext request for an invitation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestMessage {
    /// Address the invitation should go to
    pub email: String,
    /// When the request was made
    pub date: Timestamp,
}

impl Schema for RequestMessage {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["email", "date"])?;
        Ok(Self {
            email: fields.field("email", rules::email)?,
            date: fields.field("date", Timestamp::parse_at)?,
        })
    }
}
