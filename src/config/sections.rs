// ABOUTME: Typed sections of rollwright.yml: build, image, rollout, rollback, cluster.
// ABOUTME: Every section has defaults except the ones naming project-specific paths.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::deserialize::deserialize_command;
use super::env_value::EnvValue;
use crate::error::{Error, Result};
use crate::rollout::RetryPolicy;
use crate::types::ImageRef;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Program and arguments producing the artifact, e.g. `mvn -B package`.
    #[serde(deserialize_with = "deserialize_command")]
    pub command: Vec<String>,
    pub artifact: PathBuf,
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    /// Image name without tag, e.g. `registry.example.com/shop/web`.
    pub repository: String,
    pub tag: EnvValue,
    #[serde(default = "default_context")]
    pub context: PathBuf,
    #[serde(default)]
    pub dockerfile: Option<PathBuf>,
    #[serde(default = "default_docker")]
    pub docker: String,
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_docker() -> String {
    "docker".to_string()
}

impl ImageConfig {
    /// The reference the publish stage pushes, with the tag resolved.
    pub fn image_ref(&self) -> Result<ImageRef> {
        let tag = self.tag.resolve()?;
        ImageRef::parse(&format!("{}:{}", self.repository, tag))
            .map_err(|e| Error::InvalidConfig(format!("image: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub path: PathBuf,
    /// Overrides the top-level `use_published_image` for this manifest.
    #[serde(default)]
    pub use_published_image: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RolloutConfig {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(3),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollbackConfig {
    /// Restore the previous spec when a rollout fails.
    pub automatic: bool,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self { automatic: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterConfig {
    /// kubectl binary to run.
    pub kubectl: String,
    pub context: Option<String>,
    pub namespace: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            context: None,
            namespace: None,
        }
    }
}
