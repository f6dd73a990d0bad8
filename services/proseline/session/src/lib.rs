//! Handshake state machine, envelope verification, and replication/invitation
//! profiles for proseline.
//!
//! One engine, two profiles:
//!
//! | Profile | Version | Frames | Tags |
//! |---|---|---|---|
//! | [`ReplicationProfile`] | 2 | XChaCha20-Poly1305 | 1 offer, 2 request, 3 envelope |
//! | [`InvitationProfile`] | 1 | plaintext | 1 invitation, 2 request |
//!
//! A session runs over any [`SessionStream`] (`AsyncRead + AsyncWrite`);
//! [`IoStream`] wraps TCP and in-memory pipes.
//!
//! Tag 0 is the handshake in both. Nothing but a handshake may arrive before
//! the peer's handshake, and nothing but a handshake may be sent before the
//! local one.
//!
//! ## Example
//!
//! ```rust,no_run
//! use proseline_crypto::{Keypair, ReplicationKey};
//! use proseline_session::{
//!     memory_pair, Event, ReplicationMessage, ReplicationProfile, Session, SessionConfig,
//! };
//!
//! # async fn example() -> Result<(), proseline_session::SessionError> {
//! let key = ReplicationKey::generate();
//! let project = Keypair::generate();
//! let (a, b) = memory_pair(64 * 1024);
//!
//! let mut alice = Session::new(
//!     a,
//!     ReplicationProfile::new(&key, project.public_key()),
//!     SessionConfig::default(),
//! );
//! let mut bob = Session::new(
//!     b,
//!     ReplicationProfile::new(&key, project.public_key()),
//!     SessionConfig::default(),
//! );
//! alice.handshake().await?;
//! bob.handshake().await?;
//!
//! while let Some(event) = bob.next_event().await {
//!     match event {
//!         Event::Handshake(handshake) => println!("peer speaks version {}", handshake.version),
//!         Event::Message(ReplicationMessage::Envelope(envelope)) => {
//!             println!("entry {} of {:?}", envelope.message.index, envelope.public_key);
//!         }
//!         Event::Message(other) => println!("{:?}", other),
//!         Event::Invalid { tag, rejection } => println!("rejected tag {}: {}", tag, rejection),
//!         Event::Closed { error } => {
//!             println!("closed: {:?}", error);
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod error;
pub mod invitation;
pub mod profile;
pub mod replication;
pub mod session;
pub mod transport;
pub mod verifier;

// Re-export main types
pub use chain::{ChainStore, MemoryChainStore};
pub use error::{ChainViolation, Rejection, SessionError, VerificationError};
pub use invitation::{InvitationProfile, InviteMessage};
pub use profile::Profile;
pub use replication::{ReplicationMessage, ReplicationProfile};
pub use session::{Event, Session, SessionConfig, SessionState};
pub use transport::{connect_tcp, listen_tcp, memory_pair, IoStream, SessionStream};
pub use verifier::{ChainPolicy, EnvelopeVerifier};

/// Session speaking the replication profile
pub type ReplicationSession = Session<ReplicationProfile>;

/// Session speaking the invitation profile
pub type InvitationSession = Session<InvitationProfile>;
