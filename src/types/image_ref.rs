// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Handles formats like nginx:tag, registry:5000/org/image:tag@digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),

    #[error("image tag cannot be empty")]
    EmptyTag,
}

/// A parsed container image reference.
///
/// Unlike `docker pull`, parsing never invents a `latest` tag: a reference
/// without tag or digest is kept as-is and reported by [`ImageRef::is_resolvable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@') {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((_, "")) => return Err(ParseImageRefError::InvalidFormat(input.to_string())),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon followed by a slash belongs to a registry port, not a tag
        let (without_tag, tag) = match without_digest.rsplit_once(':') {
            Some((_, after)) if after.contains('/') => (without_digest, None),
            Some((_, "")) => return Err(ParseImageRefError::EmptyTag),
            Some((before, after)) => (before, Some(after.to_string())),
            None => (without_digest, None),
        };

        let (registry, name) = Self::parse_registry_and_name(without_tag)?;

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    fn parse_registry_and_name(
        input: &str,
    ) -> Result<(Option<String>, String), ParseImageRefError> {
        if input.is_empty() || input.starts_with('/') || input.ends_with('/') {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        // A registry is present if the first component contains a dot or colon,
        // or is "localhost"
        match input.split_once('/') {
            None => Ok((None, input.to_string())),
            Some((first, rest)) => {
                if first.contains('.') || first.contains(':') || first == "localhost" {
                    Ok((Some(first.to_string()), rest.to_string()))
                } else {
                    Ok((None, input.to_string()))
                }
            }
        }
    }

    /// Return a copy of this reference pointing at a different tag.
    pub fn with_tag(&self, tag: &str) -> Result<Self, ParseImageRefError> {
        if tag.is_empty() {
            return Err(ParseImageRefError::EmptyTag);
        }
        let mut image = self.clone();
        image.tag = Some(tag.to_string());
        image.digest = None;
        Ok(image)
    }

    /// Whether the reference pins something a cluster can pull: a tag or a digest.
    pub fn is_resolvable(&self) -> bool {
        self.tag.as_deref().is_some_and(|t| !t.is_empty()) || self.digest.is_some()
    }

    /// The repository part, without tag or digest (`registry/name`).
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.name),
            None => self.name.clone(),
        }
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ImageRef::parse(&s).map_err(serde::de::Error::custom)
    }
}
