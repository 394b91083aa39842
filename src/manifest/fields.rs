// ABOUTME: Path-tracking accessor over YAML mappings.
// ABOUTME: Turns absent, null, and mistyped fields into ParseErrors naming the field.

use serde_yaml::{Mapping, Value};

use super::error::ParseError;

pub(super) struct Fields<'a> {
    map: &'a Mapping,
    prefix: String,
    document: usize,
}

impl<'a> Fields<'a> {
    /// Wrap `value`, which must be a mapping. `prefix` is its own path.
    pub(super) fn new(value: &'a Value, prefix: &str, document: usize) -> Result<Self, ParseError> {
        match value {
            Value::Mapping(map) => Ok(Self {
                map,
                prefix: prefix.to_string(),
                document,
            }),
            _ => Err(ParseError::invalid(
                prefix,
                Some(document),
                "expected a mapping",
            )),
        }
    }

    pub(super) fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    pub(super) fn invalid(&self, key: &str, message: impl Into<String>) -> ParseError {
        ParseError::invalid(self.path(key), Some(self.document), message)
    }

    /// Look up a key; explicit nulls count as absent.
    pub(super) fn get(&self, key: &str) -> Option<&'a Value> {
        match self.map.get(key) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    pub(super) fn required(&self, key: &str) -> Result<&'a Value, ParseError> {
        self.get(key)
            .ok_or_else(|| ParseError::missing(self.path(key), Some(self.document)))
    }

    pub(super) fn required_str(&self, key: &str) -> Result<&'a str, ParseError> {
        match self.required(key)? {
            Value::String(s) => Ok(s.as_str()),
            _ => Err(self.invalid(key, "expected a string")),
        }
    }

    /// A scalar rendered as a string; numbers and booleans are accepted.
    pub(super) fn required_scalar(&self, key: &str) -> Result<String, ParseError> {
        match self.required(key)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(self.invalid(key, "expected a scalar value")),
        }
    }

    pub(super) fn required_u64(&self, key: &str) -> Result<u64, ParseError> {
        match self.required(key)? {
            Value::Number(n) => n.as_u64().ok_or_else(|| {
                self.invalid(key, format!("expected a non-negative integer, got {}", n))
            }),
            _ => Err(self.invalid(key, "expected an integer")),
        }
    }

    pub(super) fn required_port(&self, key: &str) -> Result<u16, ParseError> {
        let value = self.required_u64(key)?;
        port_in_range(value).ok_or_else(|| {
            self.invalid(key, format!("port {} is outside the range 1-65535", value))
        })
    }

    /// An optional sequence; absent means empty.
    pub(super) fn optional_seq(&self, key: &str) -> Result<&'a [Value], ParseError> {
        match self.get(key) {
            None => Ok(&[]),
            Some(Value::Sequence(seq)) => Ok(seq.as_slice()),
            Some(_) => Err(self.invalid(key, "expected a list")),
        }
    }

    /// Reject keys outside `allowed`.
    pub(super) fn deny_unknown(&self, allowed: &[&str]) -> Result<(), ParseError> {
        for key in self.map.keys() {
            match key {
                Value::String(k) if allowed.contains(&k.as_str()) => {}
                Value::String(k) => {
                    return Err(self.invalid(
                        k,
                        format!("unknown field, expected one of: {}", allowed.join(", ")),
                    ));
                }
                _ => {
                    return Err(ParseError::invalid(
                        self.prefix.clone(),
                        Some(self.document),
                        "field names must be strings",
                    ));
                }
            }
        }
        Ok(())
    }
}

pub(super) fn port_in_range(value: u64) -> Option<u16> {
    u16::try_from(value).ok().filter(|p| *p >= 1)
}
