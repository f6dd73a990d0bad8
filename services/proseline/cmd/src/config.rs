//! Configuration handling for the proseline CLI.
//!
//! Settings come from a YAML file, then environment variables override
//! individual values.

use anyhow::{anyhow, bail, Context, Result};
use proseline_crypto::{Keypair, PublicKey, ReplicationKey, Seed};
use proseline_session::{ChainPolicy, SessionConfig};
use proseline_wire::{DEFAULT_MAX_FRAME_SIZE, HARD_MAX_FRAME_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Proseline CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProselineConfig {
    /// Local signing identity
    pub identity: IdentityConfig,
    /// Project secrets
    pub project: ProjectConfig,
    /// Session tuning
    pub protocol: ProtocolConfig,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Local signing identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Ed25519 seed of the identity keypair
    pub seed: Option<Seed>,
}

/// Secrets of the project this node replicates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Key encrypting replication sessions
    pub replication_key: Option<ReplicationKey>,
    /// Seed of the project write keypair, held by writers only
    pub write_seed: Option<Seed>,
    /// Write public key, for readers that lack the seed
    pub write_public_key: Option<PublicKey>,
    /// Human-readable title put into invitations
    pub title: Option<String>,
}

/// Session tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Chain policy name: presence-only, cross-check-known, require-predecessor
    pub chain_policy: String,
    /// Largest frame accepted or produced, in bytes
    pub max_frame_size: usize,
    /// Capacity of each session's event channel
    pub event_buffer: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            chain_policy: ChainPolicy::default().to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            event_buffer: 64,
        }
    }
}

impl Default for ProselineConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            project: ProjectConfig::default(),
            protocol: ProtocolConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ProselineConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_environment_overrides();
        config.validate()?;

        info!(
            "Final proseline configuration: chain_policy={}, max_frame_size={}, event_buffer={}, writer={}",
            config.protocol.chain_policy,
            config.protocol.max_frame_size,
            config.protocol.event_buffer,
            config.project.write_seed.is_some()
        );

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        if let Some(seed) = env_parsed::<Seed>("PROSELINE_IDENTITY_SEED") {
            self.identity.seed = Some(seed);
            info!("Identity seed overridden by environment");
        }

        if let Some(key) = env_parsed::<ReplicationKey>("PROSELINE_REPLICATION_KEY") {
            self.project.replication_key = Some(key);
            info!("Replication key overridden by environment");
        }

        if let Some(seed) = env_parsed::<Seed>("PROSELINE_WRITE_SEED") {
            self.project.write_seed = Some(seed);
            info!("Write seed overridden by environment");
        }

        if let Ok(title) = std::env::var("PROSELINE_TITLE") {
            info!("Project title overridden by environment: {}", title);
            self.project.title = Some(title);
        }

        if let Ok(policy) = std::env::var("PROSELINE_CHAIN_POLICY") {
            info!("Chain policy overridden by environment: {}", policy);
            self.protocol.chain_policy = policy;
        }

        if let Ok(level) = std::env::var("PROSELINE_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    fn validate(&self) -> Result<()> {
        self.chain_policy()?;
        if self.protocol.max_frame_size == 0 || self.protocol.max_frame_size > HARD_MAX_FRAME_SIZE {
            bail!(
                "protocol.max_frame_size must be between 1 and {}",
                HARD_MAX_FRAME_SIZE
            );
        }
        if self.protocol.event_buffer == 0 {
            bail!("protocol.event_buffer must be positive");
        }
        if let (Some(seed), Some(public_key)) =
            (&self.project.write_seed, &self.project.write_public_key)
        {
            if Keypair::from_seed(seed).public_key() != *public_key {
                bail!("project.write_public_key does not match project.write_seed");
            }
        }
        Ok(())
    }

    /// Configured chain policy
    pub fn chain_policy(&self) -> Result<ChainPolicy> {
        ChainPolicy::from_str(&self.protocol.chain_policy).map_err(|e| anyhow!(e))
    }

    /// Session settings derived from the protocol section
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_frame_size: self.protocol.max_frame_size,
            event_buffer: self.protocol.event_buffer,
            ..SessionConfig::default()
        }
    }

    /// Local identity keypair
    pub fn identity(&self) -> Result<Keypair> {
        self.identity
            .seed
            .as_ref()
            .map(Keypair::from_seed)
            .context("no identity.seed configured (generate one with `proseline keygen`)")
    }

    /// Project replication key
    pub fn replication_key(&self) -> Result<&ReplicationKey> {
        self.project
            .replication_key
            .as_ref()
            .context("no project.replication_key configured (generate one with `proseline project`)")
    }

    /// Project write keypair, if this node is a writer
    pub fn write_keypair(&self) -> Option<Keypair> {
        self.project.write_seed.as_ref().map(Keypair::from_seed)
    }

    /// Project write public key, from the seed or the explicit setting
    pub fn project_key(&self) -> Result<PublicKey> {
        self.write_keypair()
            .map(|keypair| keypair.public_key())
            .or(self.project.write_public_key)
            .context("neither project.write_seed nor project.write_public_key is configured")
    }
}

fn env_parsed<T: FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring {}: {}", name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ProselineConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.chain_policy().unwrap(), ChainPolicy::CrossCheckKnown);
        assert_eq!(config.protocol.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert!(config.identity().is_err());
        assert!(config.project_key().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let seed = "07".repeat(32);
        let yaml_content = format!(
            r#"
identity:
  seed: "{seed}"
project:
  replication_key: "{key}"
  write_seed: "{seed}"
  title: "Novel"
protocol:
  chain_policy: require-predecessor
  event_buffer: 8
log_level: debug
"#,
            seed = seed,
            key = "0a".repeat(32)
        );

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ProselineConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.chain_policy().unwrap(), ChainPolicy::RequirePredecessor);
        assert_eq!(config.protocol.event_buffer, 8);
        assert_eq!(config.protocol.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.project.title.as_deref(), Some("Novel"));
        assert_eq!(config.replication_key().unwrap().to_hex(), "0a".repeat(32));

        let identity = config.identity().unwrap();
        assert_eq!(config.project_key().unwrap(), identity.public_key());
        assert_eq!(config.session_config().event_buffer, 8);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProselineConfig::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.protocol.event_buffer, 64);
    }

    #[test]
    fn test_unknown_chain_policy_is_an_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"protocol:\n  chain_policy: trust-everyone\n")
            .unwrap();
        assert!(ProselineConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_mismatched_write_key_is_an_error() {
        let mut config = ProselineConfig::default();
        config.project.write_seed = Some(Seed::from_bytes([1; 32]));
        config.project.write_public_key = Some(Keypair::generate().public_key());
        assert!(config.validate().is_err());
    }
}
