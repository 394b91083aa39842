// ABOUTME: Configuration types and parsing for rollwright.yml.
// ABOUTME: Handles discovery, env var interpolation, and destination merging.

mod deserialize;
mod env_value;
mod init;
mod sections;

pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use sections::{
    BuildConfig, ClusterConfig, ImageConfig, ManifestEntry, RollbackConfig, RolloutConfig,
};

use crate::cluster::KubectlCluster;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::pipeline::CommandPublisher;
use crate::rollout::RolloutSettings;
use deserialize::deserialize_manifests;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "rollwright.yml";
pub const CONFIG_FILENAME_ALT: &str = "rollwright.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rollwright/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub project: String,

    #[serde(default)]
    pub build: Option<BuildConfig>,

    #[serde(default)]
    pub image: Option<ImageConfig>,

    /// Manifests in deployment order; dependencies (e.g. the database) first.
    #[serde(deserialize_with = "deserialize_manifests")]
    pub manifests: NonEmpty<ManifestEntry>,

    /// Roll out the freshly published image instead of the manifest's own.
    #[serde(default)]
    pub use_published_image: bool,

    #[serde(default)]
    pub rollout: RolloutConfig,

    #[serde(default)]
    pub rollback: RollbackConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default = "default_verify")]
    pub verify: bool,

    #[serde(default)]
    pub destinations: HashMap<String, Destination>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub root: PathBuf,
}

fn default_verify() -> bool {
    true
}

/// Named overrides, e.g. `staging` pointing at another kube context.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Destination {
    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub rollback: Option<RollbackConfig>,
}

/// A manifest loaded from disk with its image policy decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSource {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub use_published_image: bool,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.root = project_root(path);
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                let mut config = Self::load(path)?;
                config.root = dir.to_path_buf();
                return Ok(config);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::InvalidConfig("project must not be empty".to_string()));
        }
        if self.rollout.timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "rollout.timeout must be positive".to_string(),
            ));
        }
        if self.rollout.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "rollout.poll_interval must be positive".to_string(),
            ));
        }

        let wants_published = self
            .manifests
            .iter()
            .any(|entry| entry.use_published_image.unwrap_or(self.use_published_image));
        if wants_published && self.image.is_none() {
            return Err(Error::InvalidConfig(
                "use_published_image requires an `image` section".to_string(),
            ));
        }
        if self.build.is_some() && self.image.is_none() {
            return Err(Error::InvalidConfig(
                "`build` requires an `image` section to publish to".to_string(),
            ));
        }
        Ok(())
    }

    pub fn for_destination(&self, name: &str) -> Result<Config> {
        let dest = self
            .destinations
            .get(name)
            .ok_or_else(|| Error::UnknownDestination(name.to_string()))?;

        let mut merged = self.clone();

        if dest.context.is_some() {
            merged.cluster.context = dest.context.clone();
        }

        if dest.namespace.is_some() {
            merged.cluster.namespace = dest.namespace.clone();
        }

        if let Some(timeout) = dest.timeout {
            merged.rollout.timeout = timeout;
        }

        if let Some(rollback) = dest.rollback {
            merged.rollback = rollback;
        }

        Ok(merged)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Load every manifest, in configured order.
    pub fn load_manifests(&self) -> Result<Vec<ManifestSource>> {
        self.manifests
            .iter()
            .map(|entry| -> Result<ManifestSource> {
                let path = self.resolve(&entry.path);
                let manifest = Manifest::load(&path)?;
                Ok(ManifestSource {
                    path,
                    manifest,
                    use_published_image: entry
                        .use_published_image
                        .unwrap_or(self.use_published_image),
                })
            })
            .collect()
    }

    pub fn rollout_settings(&self) -> RolloutSettings {
        RolloutSettings {
            poll_interval: self.rollout.poll_interval,
            retry: self.rollout.retry,
            automatic_rollback: self.rollback.automatic,
        }
    }

    pub fn kubectl(&self) -> KubectlCluster {
        KubectlCluster::new(self.cluster.kubectl.clone())
            .context(self.cluster.context.clone())
            .namespace(self.cluster.namespace.clone())
    }

    /// The publisher for the build and publish stages, if the project builds an image.
    pub fn publisher(&self) -> Result<Option<CommandPublisher>> {
        let Some(ref image) = self.image else {
            return Ok(None);
        };

        // Without a build section the docker context itself is the artifact
        let mut publisher =
            CommandPublisher::new(&self.root, image.context.clone(), image.image_ref()?)
                .context(image.context.clone())
                .dockerfile(image.dockerfile.clone())
                .docker(image.docker.clone());

        if let Some(ref build) = self.build {
            publisher = publisher
                .artifact(build.artifact.clone())
                .build_command(build.command.clone())
                .env(resolve_env_map(&build.env)?);
        }

        Ok(Some(publisher))
    }

    pub fn template() -> Self {
        Config {
            project: "my-app".to_string(),
            build: Some(BuildConfig {
                command: vec!["mvn".to_string(), "-B".to_string(), "package".to_string()],
                artifact: PathBuf::from("target/my-app.war"),
                env: HashMap::new(),
            }),
            image: Some(ImageConfig {
                repository: "registry.example.com/my-app".to_string(),
                tag: EnvValue::FromEnv {
                    var: "BUILD_NUMBER".to_string(),
                    default: Some("latest".to_string()),
                },
                context: PathBuf::from("."),
                dockerfile: None,
                docker: "docker".to_string(),
            }),
            manifests: NonEmpty::new(ManifestEntry {
                path: PathBuf::from("k8s/app.yml"),
                use_published_image: None,
            }),
            use_published_image: true,
            rollout: RolloutConfig::default(),
            rollback: RollbackConfig::default(),
            cluster: ClusterConfig::default(),
            verify: true,
            destinations: HashMap::new(),
            root: PathBuf::from("."),
        }
    }
}

/// The project directory for a config file, which may live in `.rollwright/`.
fn project_root(config_path: &Path) -> PathBuf {
    let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    match dir.file_name() {
        Some(name) if name == ".rollwright" => dir.parent().unwrap_or(dir).to_path_buf(),
        _ => dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_root_skips_dot_dir() {
        assert_eq!(
            project_root(Path::new("/srv/shop/.rollwright/config.yml")),
            PathBuf::from("/srv/shop")
        );
        assert_eq!(
            project_root(Path::new("/srv/shop/rollwright.yml")),
            PathBuf::from("/srv/shop")
        );
    }

    #[test]
    fn template_is_valid() {
        assert!(Config::template().validate().is_ok());
    }
}
