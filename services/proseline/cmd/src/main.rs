//! Proseline command-line tool.
//!
//! Generates identities and project secrets, issues and opens invitations,
//! verifies envelopes, and runs an in-process replication loopback.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use proseline_crypto::{discovery_key, Keypair, ReplicationKey, Seed};
use proseline_schema::{
    Intro, Invitation, InvitationMessage, LogEntry, LogEntryBody, Reference, Schema, Timestamp,
};
use proseline_session::{
    memory_pair, EnvelopeVerifier, Event, MemoryChainStore, ReplicationMessage, ReplicationProfile,
    Session,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

mod config;
mod logging;

use config::ProselineConfig;

/// Proseline protocol tooling
#[derive(Parser, Debug)]
#[command(name = "proseline", version, about = "Proseline peer-to-peer protocol tooling")]
struct Args {
    /// Configuration file path
    #[arg(long, global = true, default_value = "proseline.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new identity keypair
    Keygen,
    /// Generate secrets for a new project
    Project,
    /// Sign an invitation to the configured project
    Invite {
        /// Project title; defaults to project.title
        #[arg(long)]
        title: Option<String>,
        /// Leave out the write seed, inviting a reader
        #[arg(long)]
        read_only: bool,
    },
    /// Verify an invitation and show what it grants
    OpenInvitation {
        /// JSON file holding the invitation
        file: PathBuf,
    },
    /// Verify an envelope, or an array of envelopes in log order
    Verify {
        /// JSON file holding the envelope(s)
        file: PathBuf,
    },
    /// Replicate an intro entry between two in-memory sessions
    Loopback {
        /// Name put into the intro entry
        #[arg(long, default_value = "loopback")]
        name: String,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up before the config so loading is visible; the config
    // file's level then applies unless a flag or env var set one.
    let explicit_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("PROSELINE_LOG_LEVEL").ok());
    let log = logging::init(explicit_level.as_deref().unwrap_or("info"))?;

    info!("Starting proseline v{}", env!("CARGO_PKG_VERSION"));
    let config = ProselineConfig::load_from_file(&args.config)?;
    if explicit_level.is_none() {
        log.set_level(&config.log_level)?;
    }

    match args.command {
        Command::Keygen => keygen(),
        Command::Project => project(),
        Command::Invite { title, read_only } => invite(&config, title, read_only),
        Command::OpenInvitation { file } => open_invitation(&file),
        Command::Verify { file } => verify(&config, &file),
        Command::Loopback { name } => loopback(&config, name).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("{:?} is not JSON", path))
}

fn keygen() -> Result<()> {
    let keypair = Keypair::generate();
    print_json(&json!({
        "publicKey": keypair.public_key(),
        "seed": keypair.seed(),
    }))
}

fn project() -> Result<()> {
    let replication_key = ReplicationKey::generate();
    let write_seed = Seed::generate();
    let write = Keypair::from_seed(&write_seed);
    info!(component = "project", "generated project secrets");
    print_json(&json!({
        "replicationKey": replication_key,
        "writeSeed": write_seed,
        "writePublicKey": write.public_key(),
        "discoveryKey": discovery_key(&replication_key),
    }))
}

fn invite(config: &ProselineConfig, title: Option<String>, read_only: bool) -> Result<()> {
    let identity = config.identity()?;
    let write_seed = if read_only {
        None
    } else {
        let seed = config.project.write_seed.clone();
        if seed.is_none() {
            warn!(component = "invite", "no project.write_seed configured; inviting a reader");
        }
        seed
    };
    let message = InvitationMessage {
        replication_key: config.replication_key()?.clone(),
        write_seed,
        title: title.or_else(|| config.project.title.clone()),
    };
    let invitation = Invitation::seal(message, &identity).context("invalid invitation")?;
    info!(
        component = "invite",
        writer = invitation.message.write_seed.is_some(),
        "signed invitation"
    );
    print_json(&invitation)
}

fn open_invitation(file: &Path) -> Result<()> {
    let invitation = Invitation::parse(&read_json(file)?).context("malformed invitation")?;
    invitation.verify().context("invitation signature does not verify")?;
    let write_public_key = invitation
        .message
        .write_keypair()
        .map(|keypair| keypair.public_key());
    print_json(&json!({
        "invitedBy": invitation.public_key,
        "discoveryKey": invitation.message.discovery_key(),
        "title": invitation.message.title,
        "writer": write_public_key.is_some(),
        "writePublicKey": write_public_key,
    }))
}

fn verify(config: &ProselineConfig, file: &Path) -> Result<()> {
    let store = Arc::new(MemoryChainStore::new());
    let verifier = EnvelopeVerifier::new(config.project_key()?)
        .with_chain(config.chain_policy()?, store.clone());

    let values = match read_json(file)? {
        Value::Array(values) => values,
        value => vec![value],
    };

    let mut verified = Vec::with_capacity(values.len());
    for (position, value) in values.iter().enumerate() {
        let envelope = verifier
            .verify_value(value)
            .with_context(|| format!("envelope {} rejected", position))?;
        let digest = store.record(&envelope)?;
        debug!(component = "verify", index = envelope.message.index, "envelope verified");
        verified.push(json!({
            "publicKey": envelope.public_key,
            "index": envelope.message.index,
            "type": envelope.message.body.kind(),
            "digest": digest,
        }));
    }
    info!(
        component = "verify",
        count = verified.len(),
        policy = %verifier.policy(),
        "all envelopes verified"
    );
    print_json(&verified)
}

async fn loopback(config: &ProselineConfig, name: String) -> Result<()> {
    let (replication_key, write) = match (&config.project.replication_key, config.write_keypair()) {
        (Some(key), Some(write)) => (key.clone(), write),
        _ => {
            info!(component = "loopback", "no writable project configured; using a throwaway one");
            (ReplicationKey::generate(), Keypair::generate())
        }
    };
    let log = Keypair::generate();
    let policy = config.chain_policy()?;

    let (a, b) = memory_pair(config.protocol.max_frame_size.min(1024 * 1024));
    let mut alice = Session::new(
        a,
        ReplicationProfile::new(&replication_key, write.public_key())
            .with_write_keypair(write.clone()),
        config.session_config(),
    );
    let mut bob = Session::new(
        b,
        ReplicationProfile::new(&replication_key, write.public_key())
            .with_chain(policy, Arc::new(MemoryChainStore::new())),
        config.session_config(),
    );

    alice.handshake().await?;
    bob.handshake().await?;

    bob.request(Reference::new(log.public_key(), 0)).await?;
    loop {
        match alice.next_event().await {
            Some(Event::Handshake(handshake)) => {
                debug!(component = "loopback", version = handshake.version, "alice saw handshake")
            }
            Some(Event::Message(ReplicationMessage::Request(reference))) => {
                info!(component = "loopback", index = reference.index, "alice got request");
                break;
            }
            Some(other) => bail!("alice got unexpected event: {:?}", other),
            None => bail!("alice's session ended early"),
        }
    }

    let entry = LogEntry::first(
        alice.profile().discovery_key(),
        LogEntryBody::Intro(Intro {
            name,
            device: "proseline-cli".to_string(),
            timestamp: Timestamp::now(),
        }),
    );
    let sent = alice.publish(entry, &log).await?;

    let received = loop {
        match bob.next_event().await {
            Some(Event::Handshake(_)) => continue,
            Some(Event::Message(ReplicationMessage::Envelope(envelope))) => break envelope,
            Some(other) => bail!("bob got unexpected event: {:?}", other),
            None => bail!("bob's session ended early"),
        }
    };
    if received != sent {
        bail!("replicated envelope differs from the one sent");
    }
    info!(component = "loopback", "envelope replicated");

    alice.close().await?;
    bob.close().await?;
    for (who, session) in [("alice", &mut alice), ("bob", &mut bob)] {
        while let Some(event) = session.next_event().await {
            if let Event::Closed { error } = event {
                match error {
                    Some(e) => bail!("{}'s session failed: {}", who, e),
                    None => debug!(component = "loopback", "{} closed cleanly", who),
                }
                break;
            }
        }
    }

    print_json(&received.to_value()?)
}
