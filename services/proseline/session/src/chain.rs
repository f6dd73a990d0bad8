//! Chain-tip bookkeeping for accepted log entries.
//!
//! The verifier only reads from a [`ChainStore`]; callers that persist
//! accepted entries record them so later entries can be cross-checked.

use dashmap::DashMap;
use proseline_crypto::{Digest, PublicKey};
use proseline_schema::{Envelope, InvalidMessage};
use tracing::debug;

/// Lookup of digests of accepted entries
pub trait ChainStore: Send + Sync {
    /// Digest of entry `index` of the log `log`, if it has been accepted
    fn digest_of(&self, log: &PublicKey, index: u64) -> Option<Digest>;
}

/// In-memory chain store, safe to share between sessions
#[derive(Debug, Default)]
pub struct MemoryChainStore {
    digests: DashMap<(PublicKey, u64), Digest>,
    tips: DashMap<PublicKey, (u64, Digest)>,
}

impl MemoryChainStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted envelope and return its digest
    pub fn record(&self, envelope: &Envelope) -> Result<Digest, InvalidMessage> {
        let index = envelope.message.index;
        let digest = envelope.message.digest()?;
        self.digests.insert((envelope.public_key, index), digest);
        self.tips
            .entry(envelope.public_key)
            .and_modify(|tip| {
                if index > tip.0 {
                    *tip = (index, digest);
                }
            })
            .or_insert((index, digest));
        debug!(log = ?envelope.public_key, index, "recorded log entry");
        Ok(digest)
    }

    /// Highest recorded index of a log and its digest
    pub fn tip(&self, log: &PublicKey) -> Option<(u64, Digest)> {
        self.tips.get(log).map(|tip| *tip)
    }

    /// Number of recorded entries across all logs
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// Whether no entries are recorded
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl ChainStore for MemoryChainStore {
    fn digest_of(&self, log: &PublicKey, index: u64) -> Option<Digest> {
        self.digests.get(&(*log, index)).map(|digest| *digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proseline_crypto::Keypair;
    use proseline_schema::{Intro, LogEntry, LogEntryBody, Timestamp};

    fn intro() -> LogEntryBody {
        LogEntryBody::Intro(Intro {
            name: "alice".into(),
            device: "laptop".into(),
            timestamp: Timestamp::now(),
        })
    }

    #[test]
    fn test_record_tracks_digests_and_tip() {
        let log = Keypair::generate();
        let project = Keypair::generate();
        let store = MemoryChainStore::new();
        assert!(store.is_empty());

        let first = LogEntry::first(Digest::from_bytes([1; 32]), intro());
        let second = LogEntry::next(&first, intro()).unwrap();
        let first_digest = first.digest().unwrap();

        let recorded = store
            .record(&Envelope::seal(first, &log, &project).unwrap())
            .unwrap();
        assert_eq!(recorded, first_digest);
        assert_eq!(store.digest_of(&log.public_key(), 0), Some(first_digest));
        assert_eq!(store.tip(&log.public_key()), Some((0, first_digest)));

        let second_digest = store
            .record(&Envelope::seal(second, &log, &project).unwrap())
            .unwrap();
        assert_eq!(store.tip(&log.public_key()), Some((1, second_digest)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.digest_of(&Keypair::generate().public_key(), 0), None);
    }
}
