//! Envelope verification.
//!
//! An envelope is admissible when, in order:
//!
//! 1. it matches the envelope schema, including its first/later entry branch;
//! 2. `signature` verifies `canonicalize(message)` against `publicKey`;
//! 3. `authorization` verifies the same bytes against the project write key;
//! 4. its `prior` digest is consistent with the [`ChainPolicy`].
//!
//! Verification never records anything; see [`crate::chain`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use proseline_crypto::{verify, PublicKey};
use proseline_schema::{Envelope, Schema};
use serde_json::Value;

use crate::chain::{ChainStore, MemoryChainStore};
use crate::error::{ChainViolation, VerificationError};

/// How strictly `prior` is checked against recorded predecessors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainPolicy {
    /// Presence and shape of `prior` suffice
    PresenceOnly,
    /// Compare against the predecessor when it is recorded
    #[default]
    CrossCheckKnown,
    /// The predecessor must be recorded and match
    RequirePredecessor,
}

impl ChainPolicy {
    /// Configuration name of the policy
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainPolicy::PresenceOnly => "presence-only",
            ChainPolicy::CrossCheckKnown => "cross-check-known",
            ChainPolicy::RequirePredecessor => "require-predecessor",
        }
    }
}

impl fmt::Display for ChainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "presence-only" => Ok(ChainPolicy::PresenceOnly),
            "cross-check-known" => Ok(ChainPolicy::CrossCheckKnown),
            "require-predecessor" => Ok(ChainPolicy::RequirePredecessor),
            other => Err(format!("unknown chain policy: {}", other)),
        }
    }
}

/// Checks envelopes for one project
#[derive(Clone)]
pub struct EnvelopeVerifier {
    project_key: PublicKey,
    policy: ChainPolicy,
    chain: Arc<dyn ChainStore>,
}

impl EnvelopeVerifier {
    /// Verifier for the project whose write public key is `project_key`,
    /// with the default policy and an empty in-memory chain store
    pub fn new(project_key: PublicKey) -> Self {
        Self {
            project_key,
            policy: ChainPolicy::default(),
            chain: Arc::new(MemoryChainStore::new()),
        }
    }

    /// Use `policy` and look predecessors up in `chain`
    pub fn with_chain(mut self, policy: ChainPolicy, chain: Arc<dyn ChainStore>) -> Self {
        self.policy = policy;
        self.chain = chain;
        self
    }

    /// Project write public key
    pub fn project_key(&self) -> &PublicKey {
        &self.project_key
    }

    /// Active chain policy
    pub fn policy(&self) -> ChainPolicy {
        self.policy
    }

    /// Validate a raw envelope value, then verify it
    pub fn verify_value(&self, value: &Value) -> Result<Envelope, VerificationError> {
        let envelope = Envelope::parse(value)?;
        self.verify(&envelope)?;
        Ok(envelope)
    }

    /// Verify a typed envelope
    pub fn verify(&self, envelope: &Envelope) -> Result<(), VerificationError> {
        self.verify_signatures(envelope)?;
        self.verify_chain(envelope)
    }

    /// Schema, signature, and authorization checks, without the chain policy
    pub fn verify_signatures(&self, envelope: &Envelope) -> Result<(), VerificationError> {
        let bytes = envelope.signing_bytes()?;
        verify(&envelope.public_key, &bytes, &envelope.signature)
            .map_err(|_| VerificationError::BadSignature)?;
        verify(&self.project_key, &bytes, &envelope.authorization)
            .map_err(|_| VerificationError::BadAuthorization)
    }

    fn verify_chain(&self, envelope: &Envelope) -> Result<(), VerificationError> {
        let message = &envelope.message;
        let prior = match (message.index, message.prior) {
            (0, None) => return Ok(()),
            (0, Some(_)) => return Err(VerificationError::Chain(ChainViolation::PriorOnFirstEntry)),
            (_, None) => return Err(VerificationError::Chain(ChainViolation::MissingPrior)),
            (_, Some(prior)) => prior,
        };
        if self.policy == ChainPolicy::PresenceOnly {
            return Ok(());
        }

        let predecessor = message.index - 1;
        match self.chain.digest_of(&envelope.public_key, predecessor) {
            Some(expected) if expected != prior => {
                Err(VerificationError::Chain(ChainViolation::PriorMismatch {
                    expected,
                    actual: prior,
                }))
            }
            Some(_) => Ok(()),
            None if self.policy == ChainPolicy::RequirePredecessor => Err(
                VerificationError::Chain(ChainViolation::UnknownPredecessor { index: predecessor }),
            ),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for EnvelopeVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeVerifier")
            .field("project_key", &self.project_key)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
