//! RFC 3339 timestamps.

use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::rules;
use crate::{Constraint, InvalidMessage, Schema};

/// An RFC 3339 `date-time` string.
///
/// The original text is kept as received so that re-canonicalizing a
/// message reproduces the bytes its author signed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Current UTC time with millisecond precision
    pub fn now() -> Self {
        Self(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// The timestamp as carried on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parsed date and offset
    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.0).ok()
    }
}

impl Schema for Timestamp {
    fn parse_at(value: &Value, path: &str) -> Result<Self, InvalidMessage> {
        let s = rules::str(value, path)?;
        DateTime::parse_from_rfc3339(s)
            .map_err(|_| InvalidMessage::new(path, Constraint::Format("date-time")))?;
        Ok(Self(s.to_string()))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self(time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_original_text() {
        let ts = Timestamp::parse(&json!("2018-03-02T10:00:00+01:00")).unwrap();
        assert_eq!(ts.as_str(), "2018-03-02T10:00:00+01:00");
        assert_eq!(serde_json::to_value(&ts).unwrap(), json!("2018-03-02T10:00:00+01:00"));
    }

    #[test]
    fn test_rejects_non_rfc3339() {
        for bad in [json!("2018-03-02"), json!("yesterday"), json!(1519984800)] {
            assert!(Timestamp::parse(&bad).is_err());
        }
    }

    #[test]
    fn test_now_round_trips() {
        let now = Timestamp::now();
        assert!(now.as_str().ends_with('Z'));
        assert_eq!(Timestamp::parse(&json!(now.as_str())).unwrap(), now);

        let fixed = Timestamp::from(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(fixed.as_str(), "2020-01-02T03:04:05.000Z");
        assert!(fixed.to_datetime().is_some());
    }
}
