// ABOUTME: DeploymentSpec and environment bindings for a workload.
// ABOUTME: Parsed from `kind: Deployment` documents with field-path validation.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;

use super::error::ParseError;
use super::fields::{Fields, port_in_range};
use crate::types::{ImageRef, WorkloadName};

/// Desired state of one workload.
///
/// A spec is immutable once handed to a rollout; use [`DeploymentSpec::with_image`]
/// to derive a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub name: WorkloadName,
    pub replicas: u32,
    pub image: ImageRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
}

/// One environment variable passed to the workload's containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvBinding {
    pub name: String,
    #[serde(flatten)]
    pub source: EnvSource,
}

/// Where an environment variable's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvSource {
    /// A literal value.
    Value(String),
    /// A key inside a secret held by the cluster's secret store.
    Secret(SecretRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub key: String,
}

impl DeploymentSpec {
    pub fn new(name: WorkloadName, image: ImageRef, replicas: u32) -> Self {
        Self {
            name,
            replicas,
            image,
            env: Vec::new(),
            ports: Vec::new(),
        }
    }

    pub fn with_env(mut self, name: impl Into<String>, source: EnvSource) -> Self {
        self.env.push(EnvBinding {
            name: name.into(),
            source,
        });
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.ports.push(port);
        self
    }

    /// A new spec identical to this one but running `image`.
    pub fn with_image(&self, image: ImageRef) -> Self {
        Self {
            image,
            ..self.clone()
        }
    }
}

const DEPLOYMENT_FIELDS: &[&str] = &["kind", "name", "replicas", "image", "env", "ports"];

pub(super) fn parse_deployment(value: &Value, document: usize) -> Result<DeploymentSpec, ParseError> {
    let fields = Fields::new(value, "", document)?;
    fields.deny_unknown(DEPLOYMENT_FIELDS)?;

    let name = WorkloadName::new(fields.required_str("name")?)
        .map_err(|e| fields.invalid("name", e.to_string()))?;

    let replicas = fields.required_u64("replicas")?;
    if replicas == 0 {
        return Err(fields.invalid("replicas", "replica count must be greater than zero"));
    }
    let replicas = u32::try_from(replicas)
        .map_err(|_| fields.invalid("replicas", format!("replica count {} is too large", replicas)))?;

    let image = ImageRef::parse(fields.required_str("image")?)
        .map_err(|e| fields.invalid("image", e.to_string()))?;
    if !image.is_resolvable() {
        return Err(fields.invalid("image", format!("image `{}` must carry a tag or digest", image)));
    }

    let mut env = Vec::new();
    let mut seen = HashSet::new();
    for (i, entry) in fields.optional_seq("env")?.iter().enumerate() {
        let binding = parse_env_binding(entry, &fields.path(&format!("env[{}]", i)), document)?;
        if !seen.insert(binding.name.clone()) {
            return Err(ParseError::invalid(
                format!("env[{}].name", i),
                Some(document),
                format!("duplicate environment variable `{}`", binding.name),
            ));
        }
        env.push(binding);
    }

    let mut ports = Vec::new();
    for (i, entry) in fields.optional_seq("ports")?.iter().enumerate() {
        let path = format!("ports[{}]", i);
        let port = entry
            .as_u64()
            .ok_or_else(|| fields.invalid(&path, "expected a port number"))?;
        let port = port_in_range(port).ok_or_else(|| {
            fields.invalid(&path, format!("port {} is outside the range 1-65535", port))
        })?;
        ports.push(port);
    }

    Ok(DeploymentSpec {
        name,
        replicas,
        image,
        env,
        ports,
    })
}

fn parse_env_binding(value: &Value, path: &str, document: usize) -> Result<EnvBinding, ParseError> {
    let fields = Fields::new(value, path, document)?;
    fields.deny_unknown(&["name", "value", "secret"])?;

    let name = fields.required_str("name")?;
    if name.is_empty() || name.contains('=') {
        return Err(fields.invalid("name", "environment variable names must be non-empty and contain no '='"));
    }

    let source = match (fields.get("value"), fields.get("secret")) {
        (Some(_), Some(_)) => {
            return Err(fields.invalid("value", "set either `value` or `secret`, not both"));
        }
        (Some(_), None) => EnvSource::Value(fields.required_scalar("value")?),
        (None, Some(secret)) => {
            let secret_path = fields.path("secret");
            let secret = Fields::new(secret, &secret_path, document)?;
            secret.deny_unknown(&["name", "key"])?;
            let name = secret.required_str("name")?;
            let key = secret.required_str("key")?;
            if name.is_empty() {
                return Err(secret.invalid("name", "secret name cannot be empty"));
            }
            if key.is_empty() {
                return Err(secret.invalid("key", "secret key cannot be empty"));
            }
            EnvSource::Secret(SecretRef {
                name: name.to_string(),
                key: key.to_string(),
            })
        }
        (None, None) => return Err(ParseError::missing(fields.path("value"), Some(document))),
    };

    Ok(EnvBinding {
        name: name.to_string(),
        source,
    })
}
