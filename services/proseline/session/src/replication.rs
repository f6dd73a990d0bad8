//! Replication profile: offers, requests, and envelopes of log entries,
//! encrypted with the project's replication key.

use std::sync::Arc;

use proseline_crypto::{discovery_key, Digest, Keypair, PublicKey, ReplicationKey, SessionCipher};
use proseline_schema::{Envelope, LogEntry, Reference, Schema};
use proseline_wire::TaggedMessage;
use serde_json::Value;
use tracing::debug;

use crate::chain::ChainStore;
use crate::error::{Rejection, SessionError};
use crate::profile::{tagged, Profile};
use crate::session::Session;
use crate::transport::SessionStream;
use crate::verifier::{ChainPolicy, EnvelopeVerifier};

/// Tag of offer messages
pub const OFFER_TAG: u64 = 1;
/// Tag of request messages
pub const REQUEST_TAG: u64 = 2;
/// Tag of envelope messages
pub const ENVELOPE_TAG: u64 = 3;

/// Messages of the replication profile
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationMessage {
    /// The sender can provide this entry
    Offer(Reference),
    /// The sender wants this entry
    Request(Reference),
    /// A signed and authorized entry
    Envelope(Envelope),
}

/// Replication profile for one project
pub struct ReplicationProfile {
    cipher: SessionCipher,
    discovery_key: Digest,
    verifier: EnvelopeVerifier,
    write_keypair: Option<Keypair>,
}

impl ReplicationProfile {
    /// Profile for the project with `replication_key` whose write public key
    /// is `project_key`
    pub fn new(replication_key: &ReplicationKey, project_key: PublicKey) -> Self {
        Self {
            cipher: SessionCipher::new(replication_key),
            discovery_key: discovery_key(replication_key),
            verifier: EnvelopeVerifier::new(project_key),
            write_keypair: None,
        }
    }

    /// Check `prior` digests against `chain` under `policy`
    pub fn with_chain(mut self, policy: ChainPolicy, chain: Arc<dyn ChainStore>) -> Self {
        self.verifier = self.verifier.with_chain(policy, chain);
        self
    }

    /// Hold the project write keypair so outbound entries can be authorized
    pub fn with_write_keypair(mut self, keypair: Keypair) -> Self {
        self.write_keypair = Some(keypair);
        self
    }

    /// Discovery key of the project
    pub fn discovery_key(&self) -> Digest {
        self.discovery_key
    }

    /// Envelope verifier of the project
    pub fn verifier(&self) -> &EnvelopeVerifier {
        &self.verifier
    }
}

impl Profile for ReplicationProfile {
    type Message = ReplicationMessage;

    const NAME: &'static str = "replication";
    const VERSION: u64 = 2;

    fn is_known(tag: u64) -> bool {
        matches!(tag, OFFER_TAG | REQUEST_TAG | ENVELOPE_TAG)
    }

    fn cipher(&self) -> Option<&SessionCipher> {
        Some(&self.cipher)
    }

    fn encode(&self, message: &ReplicationMessage) -> Result<TaggedMessage, Rejection> {
        match message {
            ReplicationMessage::Offer(reference) => Ok(tagged(OFFER_TAG, reference)?),
            ReplicationMessage::Request(reference) => Ok(tagged(REQUEST_TAG, reference)?),
            ReplicationMessage::Envelope(envelope) => {
                self.verifier.verify_signatures(envelope)?;
                Ok(tagged(ENVELOPE_TAG, envelope)?)
            }
        }
    }

    fn accept(&self, tag: u64, body: &Value) -> Result<ReplicationMessage, Rejection> {
        match tag {
            OFFER_TAG => Ok(ReplicationMessage::Offer(Reference::parse(body)?)),
            REQUEST_TAG => Ok(ReplicationMessage::Request(Reference::parse(body)?)),
            _ => Ok(ReplicationMessage::Envelope(self.verifier.verify_value(body)?)),
        }
    }
}

impl<S: SessionStream> Session<ReplicationProfile, S> {
    /// Offer an entry to the peer
    pub async fn offer(&mut self, reference: Reference) -> Result<(), SessionError> {
        self.send(ReplicationMessage::Offer(reference)).await
    }

    /// Request an entry from the peer
    pub async fn request(&mut self, reference: Reference) -> Result<(), SessionError> {
        self.send(ReplicationMessage::Request(reference)).await
    }

    /// Send a signed and authorized entry
    pub async fn envelope(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        self.send(ReplicationMessage::Envelope(envelope)).await
    }

    /// Sign `entry` with the log keypair, authorize it with the project
    /// write keypair, and send it. Returns the envelope that was sent.
    pub async fn publish(
        &mut self,
        entry: LogEntry,
        log: &Keypair,
    ) -> Result<Envelope, SessionError> {
        let project = self
            .profile()
            .write_keypair
            .as_ref()
            .ok_or(SessionError::MissingWriteKey)?;
        let envelope = Envelope::seal(entry, log, project)
            .map_err(|e| SessionError::InvalidOutbound(e.into()))?;
        debug!(index = envelope.message.index, "publishing log entry");
        self.envelope(envelope.clone()).await?;
        Ok(envelope)
    }
}
