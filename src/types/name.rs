// ABOUTME: DNS-compatible workload and service name validation.
// ABOUTME: Ensures names follow RFC 1123 label requirements.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("name must be lowercase")]
    NotLowercase,

    #[error("invalid character in name: '{0}'")]
    InvalidChar(char),
}

fn validate_label(value: &str) -> Result<(), NameError> {
    if value.is_empty() {
        return Err(NameError::Empty);
    }

    if value.len() > 63 {
        return Err(NameError::TooLong);
    }

    if value.starts_with('-') {
        return Err(NameError::StartsWithHyphen);
    }

    if value.ends_with('-') {
        return Err(NameError::EndsWithHyphen);
    }

    for c in value.chars() {
        if c.is_ascii_uppercase() {
            return Err(NameError::NotLowercase);
        }
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return Err(NameError::InvalidChar(c));
        }
    }

    Ok(())
}

macro_rules! dns_label {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $ty(String);

        impl $ty {
            pub fn new(value: &str) -> Result<Self, NameError> {
                validate_label(value)?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

dns_label!(
    /// Identity of a deployable workload (application or database).
    WorkloadName
);

dns_label!(
    /// Name of a service exposing a workload.
    ServiceName
);
