//! Session, verification, and rejection errors.

use proseline_crypto::{CryptoError, Digest};
use proseline_schema::{InvalidMessage, Position};
use proseline_wire::WireError;
use thiserror::Error;

/// Why an envelope's chain fields are unacceptable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// Entry 0 carries a `prior` digest
    #[error("first entry must not carry prior")]
    PriorOnFirstEntry,

    /// A later entry has no `prior` digest
    #[error("entry after the first must carry prior")]
    MissingPrior,

    /// `prior` differs from the digest recorded for the predecessor
    #[error("prior {actual:?} does not match predecessor digest {expected:?}")]
    PriorMismatch {
        /// Digest of the recorded predecessor
        expected: Digest,
        /// Digest carried by the entry
        actual: Digest,
    },

    /// Policy requires the predecessor but none is recorded
    #[error("predecessor entry {index} is not known")]
    UnknownPredecessor {
        /// Index of the missing predecessor
        index: u64,
    },
}

/// An envelope is not admissible
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Envelope shape is invalid
    #[error("envelope schema: {0}")]
    Schema(InvalidMessage),

    /// `signature` does not verify against the log's public key
    #[error("log signature does not verify")]
    BadSignature,

    /// `authorization` does not verify against the project write key
    #[error("project authorization does not verify")]
    BadAuthorization,

    /// Position and chain fields are inconsistent
    #[error("chain error: {0}")]
    Chain(ChainViolation),
}

impl From<InvalidMessage> for VerificationError {
    fn from(error: InvalidMessage) -> Self {
        match error.position() {
            Some(Position::PriorOnFirstEntry) => {
                VerificationError::Chain(ChainViolation::PriorOnFirstEntry)
            }
            Some(Position::MissingPrior) => VerificationError::Chain(ChainViolation::MissingPrior),
            None => VerificationError::Schema(error),
        }
    }
}

/// An inbound message was rejected; the session stays open
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Message failed schema validation
    #[error(transparent)]
    Invalid(#[from] InvalidMessage),

    /// Envelope failed verification
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Self-signed message carries a bad signature
    #[error("bad signature: {0}")]
    Signature(#[source] CryptoError),
}

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Frame or tagged-message bytes are malformed
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Inbound payload failed to decrypt
    #[error("decryption failed")]
    Decryption,

    /// Outbound payload failed to encrypt; nothing was sent
    #[error("encryption failed: {0}")]
    Encryption(#[source] CryptoError),

    /// Outbound message could not be framed, for instance because it
    /// exceeds the maximum frame size; nothing was sent
    #[error("cannot frame outbound message: {0}")]
    Unframeable(#[source] WireError),

    /// Peer speaks another protocol version
    #[error("incompatible version: expected {expected}, received {received}")]
    IncompatibleVersion {
        /// Local protocol version
        expected: u64,
        /// Version advertised by the peer
        received: u64,
    },

    /// Peer sent a message before its handshake
    #[error("message with tag {0} received before handshake")]
    MessageBeforeHandshake(u64),

    /// Tag is not part of this profile
    #[error("unknown message tag {0}")]
    UnknownTag(u64),

    /// Underlying stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Work scheduled before the half-close failed
    #[error("finalize failed: {0}")]
    Finalize(String),

    /// Outbound payload failed local validation; nothing was sent
    #[error("invalid outbound message: {0}")]
    InvalidOutbound(Rejection),

    /// Typed messages require the local handshake first; nothing was sent
    #[error("handshake has not been sent")]
    HandshakeNotSent,

    /// Authorizing an entry needs the project write keypair
    #[error("no project write keypair configured")]
    MissingWriteKey,

    /// Session was destroyed
    #[error("session destroyed")]
    Destroyed,
}

impl SessionError {
    /// Whether this error ends the session. Caller errors leave it usable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SessionError::InvalidOutbound(_)
                | SessionError::Unframeable(_)
                | SessionError::Encryption(_)
                | SessionError::HandshakeNotSent
                | SessionError::MissingWriteKey
                | SessionError::Destroyed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proseline_schema::Constraint;

    #[test]
    fn test_position_errors_become_chain_errors() {
        let forbidden = InvalidMessage::new(
            "message.prior",
            Constraint::Position(Position::PriorOnFirstEntry),
        );
        assert_eq!(
            VerificationError::from(forbidden),
            VerificationError::Chain(ChainViolation::PriorOnFirstEntry)
        );
        let missing =
            InvalidMessage::new("message.prior", Constraint::Position(Position::MissingPrior));
        assert_eq!(
            VerificationError::from(missing),
            VerificationError::Chain(ChainViolation::MissingPrior)
        );
        let shape = InvalidMessage::new("publicKey", Constraint::Required);
        assert!(matches!(
            VerificationError::from(shape),
            VerificationError::Schema(_)
        ));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SessionError::Decryption.is_fatal());
        assert!(SessionError::MessageBeforeHandshake(1).is_fatal());
        assert!(!SessionError::HandshakeNotSent.is_fatal());
        assert!(!SessionError::Destroyed.is_fatal());
        assert!(!SessionError::Unframeable(WireError::Size(9)).is_fatal());
        assert!(SessionError::Wire(WireError::Size(9)).is_fatal());
    }
}
