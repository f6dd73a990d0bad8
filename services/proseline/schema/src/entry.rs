//! Log entries and the record kinds they carry.
//!
//! A log is an append-only sequence of entries signed by one author. Entry
//! `0` stands alone; every later entry names the digest of its predecessor
//! in `prior`, chaining the log together.

use std::fmt;

use proseline_crypto::{generic_hash, Digest};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::rules::{self, Fields};
use crate::{Constraint, InvalidMessage, Position, Schema, Timestamp};

const NAME_MAX: usize = 256;

/// Signed payload of an envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Discovery key of the project the log belongs to
    pub project: Digest,
    /// Position in the log
    pub index: u64,
    /// Digest of entry `index - 1`; absent exactly when `index` is 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior: Option<Digest>,
    /// The record itself
    pub body: LogEntryBody,
}

impl LogEntry {
    /// First entry of a log
    pub fn first(project: Digest, body: LogEntryBody) -> Self {
        Self {
            project,
            index: 0,
            prior: None,
            body,
        }
    }

    /// Entry that follows `previous` in the same log
    pub fn next(previous: &LogEntry, body: LogEntryBody) -> Result<Self, InvalidMessage> {
        let index = previous
            .index
            .checked_add(1)
            .ok_or_else(|| InvalidMessage::new("index", Constraint::Maximum(u64::MAX - 1)))?;
        Ok(Self {
            project: previous.project,
            index,
            prior: Some(previous.digest()?),
            body,
        })
    }

    /// Content hash of this entry: the `prior` of the entry after it
    pub fn digest(&self) -> Result<Digest, InvalidMessage> {
        Ok(generic_hash(&self.canonical_bytes()?))
    }
}

impl Schema for LogEntry {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["project", "index", "prior", "body"])?;
        let project = fields.field("project", rules::hex)?;
        let index = fields.field("index", |v, p| rules::integer(v, p, 0))?;
        let prior = fields.optional("prior", rules::hex)?;
        match (index, &prior) {
            (0, Some(_)) => {
                return Err(InvalidMessage::new(
                    rules::join(path, "prior"),
                    Constraint::Position(Position::PriorOnFirstEntry),
                ))
            }
            (_, None) if index > 0 => {
                return Err(InvalidMessage::new(
                    rules::join(path, "prior"),
                    Constraint::Position(Position::MissingPrior),
                ))
            }
            _ => {}
        }
        Ok(Self {
            project,
            index,
            prior,
            body: fields.field("body", LogEntryBody::parse_at)?,
        })
    }
}

/// Closed union of record kinds
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntryBody {
    /// Contents of a written draft
    Draft(Draft),
    /// A named marker placed on a draft
    Mark(Mark),
    /// Comment on a range of a draft
    Note(Note),
    /// Reply to another note
    Reply(Reply),
    /// Associates a name and device with the log
    Intro(Intro),
}

impl LogEntryBody {
    /// Value of the `type` discriminator. Notes and replies share `"note"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Draft(_) => "draft",
            Self::Mark(_) => "mark",
            Self::Note(_) | Self::Reply(_) => "note",
            Self::Intro(_) => "intro",
        }
    }
}

impl Serialize for LogEntryBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a, T> {
            #[serde(rename = "type")]
            kind: &'static str,
            #[serde(flatten)]
            record: &'a T,
        }

        let kind = self.kind();
        match self {
            Self::Draft(record) => Tagged { kind, record }.serialize(serializer),
            Self::Mark(record) => Tagged { kind, record }.serialize(serializer),
            Self::Note(record) => Tagged { kind, record }.serialize(serializer),
            Self::Reply(record) => Tagged { kind, record }.serialize(serializer),
            Self::Intro(record) => Tagged { kind, record }.serialize(serializer),
        }
    }
}

impl Schema for LogEntryBody {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let map = value
            .as_object()
            .ok_or_else(|| InvalidMessage::new(path, Constraint::Type("object")))?;
        let type_path = rules::join(path, "type");
        let kind = map
            .get("type")
            .ok_or_else(|| InvalidMessage::new(&type_path, Constraint::Required))?;
        match kind.as_str() {
            Some("draft") => Draft::parse_at(value, path).map(Self::Draft),
            Some("mark") => Mark::parse_at(value, path).map(Self::Mark),
            Some("intro") => Intro::parse_at(value, path).map(Self::Intro),
            // A note is anchored to a range of the draft, a reply to its parent note.
            Some("note") if map.contains_key("parent") => {
                Reply::parse_at(value, path).map(Self::Reply)
            }
            Some("note") => Note::parse_at(value, path).map(Self::Note),
            _ => Err(InvalidMessage::new(
                type_path,
                Constraint::OneOf("draft, mark, note, intro"),
            )),
        }
    }
}

/// Draft record: the full text of a revision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    /// Digests of up to two drafts this one was based on
    pub parents: Vec<Digest>,
    /// Document contents, opaque to the protocol
    pub text: Map<String, Value>,
    /// When the draft was saved
    pub timestamp: Timestamp,
}

impl Draft {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["type", "parents", "text", "timestamp"])?;
        fields.field("type", |v, p| rules::constant(v, p, "draft"))?;
        Ok(Self {
            parents: fields.field("parents", parse_parents)?,
            text: fields.field("text", rules::object)?,
            timestamp: fields.field("timestamp", Timestamp::parse_at)?,
        })
    }
}

fn parse_parents(value: &Value, path: &str) -> Result<Vec<Digest>, InvalidMessage> {
    let items = value
        .as_array()
        .ok_or_else(|| InvalidMessage::new(path, Constraint::Type("array")))?;
    if items.len() > 2 {
        return Err(InvalidMessage::new(path, Constraint::MaxItems(2)));
    }
    let mut parents: Vec<Digest> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let digest = rules::hex(item, &format!("{}[{}]", path, i))?;
        if parents.contains(&digest) {
            return Err(InvalidMessage::new(path, Constraint::UniqueItems));
        }
        parents.push(digest);
    }
    Ok(parents)
}

/// Four-byte mark identifier, stable while the mark's name changes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkId([u8; 4]);

impl MarkId {
    /// Create an identifier from raw bytes
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// The underlying bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Debug for MarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkId({})", hex::encode(self.0))
    }
}

impl Serialize for MarkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl Schema for MarkId {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let s = rules::str(value, path)?;
        let invalid = || InvalidMessage::new(path, Constraint::Hex { chars: 8 });
        if s.len() != 8 || s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

/// Mark record: moves a named marker onto a draft
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mark {
    /// Stable identifier of the mark
    pub identifier: MarkId,
    /// Current display name
    pub name: String,
    /// When the mark was moved
    pub timestamp: Timestamp,
    /// Digest of the marked draft
    pub draft: Digest,
}

impl Mark {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(
            value,
            path,
            &["type", "identifier", "name", "timestamp", "draft"],
        )?;
        fields.field("type", |v, p| rules::constant(v, p, "mark"))?;
        Ok(Self {
            identifier: fields.field("identifier", MarkId::parse_at)?,
            name: fields.field("name", |v, p| rules::text(v, p, 1, Some(NAME_MAX)))?,
            timestamp: fields.field("timestamp", Timestamp::parse_at)?,
            draft: fields.field("draft", rules::hex)?,
        })
    }
}

/// Cursor range of a draft a note refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    /// First position, at least 0
    pub start: u64,
    /// End position, at least 1
    pub end: u64,
}

impl Schema for Range {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["start", "end"])?;
        Ok(Self {
            start: fields.field("start", |v, p| rules::integer(v, p, 0))?,
            end: fields.field("end", |v, p| rules::integer(v, p, 1))?,
        })
    }
}

/// Note record: a comment on part of a draft
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Digest of the draft
    pub draft: Digest,
    /// Part of the draft the note pertains to
    pub range: Range,
    /// Comment text
    pub text: String,
    /// When the note was written
    pub timestamp: Timestamp,
}

impl Note {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["type", "draft", "range", "text", "timestamp"])?;
        fields.field("type", |v, p| rules::constant(v, p, "note"))?;
        Ok(Self {
            draft: fields.field("draft", rules::hex)?,
            range: fields.field("range", Range::parse_at)?,
            text: fields.field("text", |v, p| rules::text(v, p, 1, None))?,
            timestamp: fields.field("timestamp", Timestamp::parse_at)?,
        })
    }
}

/// Reply record: a note answering another note
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    /// Digest of the draft
    pub draft: Digest,
    /// Digest of the note being answered
    pub parent: Digest,
    /// Reply text
    pub text: String,
    /// When the reply was written
    pub timestamp: Timestamp,
}

impl Reply {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["type", "draft", "parent", "text", "timestamp"])?;
        fields.field("type", |v, p| rules::constant(v, p, "note"))?;
        Ok(Self {
            draft: fields.field("draft", rules::hex)?,
            parent: fields.field("parent", rules::hex)?,
            text: fields.field("text", |v, p| rules::text(v, p, 1, None))?,
            timestamp: fields.field("timestamp", Timestamp::parse_at)?,
        })
    }
}

/// Intro record: "alice on laptop"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intro {
    /// Author name
    pub name: String,
    /// Device name
    pub device: String,
    /// When the intro was written
    pub timestamp: Timestamp,
}

impl Intro {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let fields = Fields::closed(value, path, &["type", "name", "device", "timestamp"])?;
        fields.field("type", |v, p| rules::constant(v, p, "intro"))?;
        Ok(Self {
            name: fields.field("name", |v, p| rules::text(v, p, 1, Some(NAME_MAX)))?,
            device: fields.field("device", |v, p| rules::text(v, p, 1, Some(NAME_MAX)))?,
            timestamp: fields.field("timestamp", Timestamp::parse_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TS: &str = "2018-03-02T10:00:00.000Z";

    fn digest(byte: u8) -> String {
        format!("{:02x}", byte).repeat(32)
    }

    fn intro() -> LogEntryBody {
        LogEntryBody::parse(&json!({
            "type": "intro", "name": "alice", "device": "laptop", "timestamp": TS
        }))
        .unwrap()
    }

    #[test]
    fn test_body_kinds_round_trip() {
        let bodies = [
            json!({"type": "draft", "parents": [digest(1)], "text": {"ops": [1, 2]}, "timestamp": TS}),
            json!({"type": "mark", "identifier": "0a0b0c0d", "name": "final", "timestamp": TS, "draft": digest(2)}),
            json!({"type": "note", "draft": digest(2), "range": {"start": 0, "end": 4}, "text": "tighten", "timestamp": TS}),
            json!({"type": "note", "draft": digest(2), "parent": digest(3), "text": "agreed", "timestamp": TS}),
            json!({"type": "intro", "name": "alice", "device": "laptop", "timestamp": TS}),
        ];
        let kinds = ["draft", "mark", "note", "note", "intro"];
        for (value, kind) in bodies.iter().zip(kinds) {
            let body = LogEntryBody::parse(value).unwrap();
            assert_eq!(body.kind(), kind);
            assert_eq!(&body.to_value().unwrap(), value);
        }
    }

    #[test]
    fn test_note_and_reply_are_told_apart() {
        let reply = json!({"type": "note", "draft": digest(2), "parent": digest(3), "text": "ok", "timestamp": TS});
        assert!(matches!(LogEntryBody::parse(&reply).unwrap(), LogEntryBody::Reply(_)));

        let both = json!({
            "type": "note", "draft": digest(2), "parent": digest(3),
            "range": {"start": 0, "end": 1}, "text": "ok", "timestamp": TS
        });
        assert_eq!(
            LogEntryBody::parse(&both).unwrap_err(),
            InvalidMessage::new("range", Constraint::Unexpected)
        );
    }

    #[test]
    fn test_body_constraints() {
        let cases = [
            (
                json!({"type": "draft", "parents": [digest(1), digest(1)], "text": {}, "timestamp": TS}),
                InvalidMessage::new("parents", Constraint::UniqueItems),
            ),
            (
                json!({"type": "draft", "parents": [digest(1), digest(2), digest(3)], "text": {}, "timestamp": TS}),
                InvalidMessage::new("parents", Constraint::MaxItems(2)),
            ),
            (
                json!({"type": "draft", "parents": ["xyz"], "text": {}, "timestamp": TS}),
                InvalidMessage::new("parents[0]", Constraint::Hex { chars: 64 }),
            ),
            (
                json!({"type": "draft", "parents": [], "text": "plain", "timestamp": TS}),
                InvalidMessage::new("text", Constraint::Type("object")),
            ),
            (
                json!({"type": "mark", "identifier": "0A0B0C0D", "name": "x", "timestamp": TS, "draft": digest(2)}),
                InvalidMessage::new("identifier", Constraint::Hex { chars: 8 }),
            ),
            (
                json!({"type": "intro", "name": "", "device": "laptop", "timestamp": TS}),
                InvalidMessage::new("name", Constraint::MinLength(1)),
            ),
            (
                json!({"type": "intro", "name": "a".repeat(257), "device": "laptop", "timestamp": TS}),
                InvalidMessage::new("name", Constraint::MaxLength(256)),
            ),
            (
                json!({"type": "note", "draft": digest(2), "range": {"start": 0, "end": 0}, "text": "x", "timestamp": TS}),
                InvalidMessage::new("range.end", Constraint::Minimum(1)),
            ),
            (
                json!({"type": "intro", "name": "a", "device": "b", "timestamp": "now"}),
                InvalidMessage::new("timestamp", Constraint::Format("date-time")),
            ),
            (
                json!({"type": "poem", "timestamp": TS}),
                InvalidMessage::new("type", Constraint::OneOf("draft, mark, note, intro")),
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(LogEntryBody::parse(&value).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_entry_position_rules() {
        let body = intro().to_value().unwrap();
        let first_with_prior = json!({"project": digest(9), "index": 0, "prior": digest(1), "body": body});
        let err = LogEntry::parse_at(&first_with_prior, "message").unwrap_err();
        assert_eq!(err.path, "message.prior");
        assert_eq!(err.position(), Some(Position::PriorOnFirstEntry));

        let later_without_prior = json!({"project": digest(9), "index": 1, "body": body});
        assert_eq!(
            LogEntry::parse(&later_without_prior).unwrap_err().position(),
            Some(Position::MissingPrior)
        );

        let first = json!({"project": digest(9), "index": 0, "body": body});
        assert_eq!(LogEntry::parse(&first).unwrap().to_value().unwrap(), first);
    }

    #[test]
    fn test_next_links_to_digest_of_previous() {
        let first = LogEntry::first(Digest::from_bytes([9; 32]), intro());
        let second = LogEntry::next(&first, intro()).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.project, first.project);
        assert_eq!(
            second.prior,
            Some(generic_hash(&proseline_wire::canonicalize(&first.to_value().unwrap()).unwrap()))
        );
        assert_ne!(first.digest().unwrap(), second.digest().unwrap());
    }

    #[test]
    fn test_next_after_last_index_is_rejected() {
        let mut last = LogEntry::first(Digest::from_bytes([9; 32]), intro());
        last.index = u64::MAX;
        last.prior = Some(Digest::from_bytes([1; 32]));
        let err = LogEntry::next(&last, intro()).unwrap_err();
        assert_eq!(err.path, "index");
        assert_eq!(err.constraint, Constraint::Maximum(u64::MAX - 1));
    }
}
