//! Field-level validation helpers shared by every record type.

use std::str::FromStr;

use proseline_crypto::CryptoError;
use serde_json::{Map, Value};

use crate::{Constraint, InvalidMessage};

/// Path of `key` inside the object at `path`
pub(crate) fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

/// A closed JSON object: only the listed keys may appear.
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    pub(crate) fn closed(
        value: &'a Value,
        path: &str,
        allowed: &[&str],
    ) -> Result<Self, InvalidMessage> {
        let map = value
            .as_object()
            .ok_or_else(|| InvalidMessage::new(path, Constraint::Type("object")))?;
        if let Some(key) = map.keys().find(|key| !allowed.contains(&key.as_str())) {
            return Err(InvalidMessage::new(join(path, key), Constraint::Unexpected));
        }
        Ok(Self {
            map,
            path: path.to_string(),
        })
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Parse a required field
    pub(crate) fn field<T>(
        &self,
        key: &str,
        parse: impl FnOnce(&'a Value, &str) -> Result<T, InvalidMessage>,
    ) -> Result<T, InvalidMessage> {
        let path = join(&self.path, key);
        match self.map.get(key) {
            Some(value) => parse(value, &path),
            None => Err(InvalidMessage::new(path, Constraint::Required)),
        }
    }

    /// Parse a field that may be absent
    pub(crate) fn optional<T>(
        &self,
        key: &str,
        parse: impl FnOnce(&'a Value, &str) -> Result<T, InvalidMessage>,
    ) -> Result<Option<T>, InvalidMessage> {
        match self.map.get(key) {
            Some(value) => parse(value, &join(&self.path, key)).map(Some),
            None => Ok(None),
        }
    }
}

pub(crate) fn str<'a>(value: &'a Value, path: &str) -> Result<&'a str, InvalidMessage> {
    value
        .as_str()
        .ok_or_else(|| InvalidMessage::new(path, Constraint::Type("string")))
}

/// Lowercase hex newtype from `proseline-crypto`
pub(crate) fn hex<T>(value: &Value, path: &str) -> Result<T, InvalidMessage>
where
    T: FromStr<Err = CryptoError>,
{
    str(value, path)?.parse().map_err(|error| match error {
        CryptoError::Hex { expected, .. } => {
            InvalidMessage::new(path, Constraint::Hex { chars: expected })
        }
        _ => InvalidMessage::new(path, Constraint::Type("hex string")),
    })
}

/// Non-negative integer no smaller than `min`
pub(crate) fn integer(value: &Value, path: &str, min: u64) -> Result<u64, InvalidMessage> {
    let n = match value {
        Value::Number(n) if n.is_u64() => n.as_u64().unwrap_or_default(),
        Value::Number(n) if n.is_i64() => {
            return Err(InvalidMessage::new(path, Constraint::Minimum(min)))
        }
        _ => return Err(InvalidMessage::new(path, Constraint::Type("integer"))),
    };
    if n < min {
        return Err(InvalidMessage::new(path, Constraint::Minimum(min)));
    }
    Ok(n)
}

/// String whose length in characters lies within `min..=max`
pub(crate) fn text(
    value: &Value,
    path: &str,
    min: usize,
    max: Option<usize>,
) -> Result<String, InvalidMessage> {
    let s = str(value, path)?;
    let len = s.chars().count();
    if len < min {
        return Err(InvalidMessage::new(path, Constraint::MinLength(min)));
    }
    if let Some(max) = max.filter(|max| len > *max) {
        return Err(InvalidMessage::new(path, Constraint::MaxLength(max)));
    }
    Ok(s.to_string())
}

pub(crate) fn constant(
    value: &Value,
    path: &str,
    expected: &'static str,
) -> Result<(), InvalidMessage> {
    match value.as_str() {
        Some(s) if s == expected => Ok(()),
        _ => Err(InvalidMessage::new(path, Constraint::Const(expected))),
    }
}

pub(crate) fn object(value: &Value, path: &str) -> Result<Map<String, Value>, InvalidMessage> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| InvalidMessage::new(path, Constraint::Type("object")))
}

/// Loose address check: `local@domain.tld` with no whitespace.
pub(crate) fn email(value: &Value, path: &str) -> Result<String, InvalidMessage> {
    let s = str(value, path)?;
    let invalid = || InvalidMessage::new(path, Constraint::Format("email"));
    let (local, domain) = s.split_once('@').ok_or_else(invalid)?;
    let label_ok = |label: &str| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c));
    if !local_ok || !domain.split('.').all(label_ok) {
        return Err(invalid());
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_closed_object() {
        let value = json!({"a": 1, "b": 2});
        let err = Fields::closed(&value, "root", &["a"]).err().unwrap();
        assert_eq!(err, InvalidMessage::new("root.b", Constraint::Unexpected));

        let fields = Fields::closed(&value, "", &["a", "b", "c"]).unwrap();
        assert_eq!(fields.field("a", |v, p| integer(v, p, 0)).unwrap(), 1);
        assert_eq!(fields.optional("c", |v, p| integer(v, p, 0)).unwrap(), None);
        assert_eq!(
            fields.field("c", |v, p| integer(v, p, 0)).unwrap_err(),
            InvalidMessage::new("c", Constraint::Required)
        );
    }

    #[test]
    fn test_integer_bounds() {
        assert_eq!(integer(&json!(3), "n", 1).unwrap(), 3);
        assert_eq!(
            integer(&json!(0), "n", 1).unwrap_err().constraint,
            Constraint::Minimum(1)
        );
        assert_eq!(
            integer(&json!(-2), "n", 0).unwrap_err().constraint,
            Constraint::Minimum(0)
        );
        assert_eq!(
            integer(&json!(1.5), "n", 0).unwrap_err().constraint,
            Constraint::Type("integer")
        );
        assert!(integer(&json!("1"), "n", 0).is_err());
    }

    #[test]
    fn test_text_length_counts_characters() {
        assert!(text(&json!("é"), "s", 1, Some(1)).is_ok());
        assert_eq!(
            text(&json!(""), "s", 1, None).unwrap_err().constraint,
            Constraint::MinLength(1)
        );
        assert_eq!(
            text(&json!("abc"), "s", 1, Some(2)).unwrap_err().constraint,
            Constraint::MaxLength(2)
        );
    }

    #[test]
    fn test_email_format() {
        assert!(email(&json!("kyle@example.com"), "e").is_ok());
        assert!(email(&json!("first.last+tag@mail.example.org"), "e").is_ok());
        for bad in ["", "kyle", "@example.com", "kyle@", "ky le@example.com", "kyle@-bad.com"] {
            assert!(email(&json!(bad), "e").is_err(), "{bad:?} should be rejected");
        }
    }
}
