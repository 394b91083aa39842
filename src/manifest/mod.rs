// ABOUTME: Declarative manifest model: one workload plus the services exposing it.
// ABOUTME: Parses multi-document YAML with strict validation and re-serializes losslessly.

mod deployment;
mod error;
mod fields;
mod service;

pub use deployment::{DeploymentSpec, EnvBinding, EnvSource, SecretRef};
pub use error::{LoadError, ParseError, ParseErrorKind};
pub use service::{Exposure, ServiceSpec};

use crate::cluster::{render_deployment, render_service};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashSet;
use std::path::Path;

/// A document group: exactly one workload and zero or more services selecting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub deployment: DeploymentSpec,
    pub services: Vec<ServiceSpec>,
}

#[derive(Serialize)]
#[serde(tag = "kind")]
enum Document<'a> {
    Deployment(&'a DeploymentSpec),
    Service(&'a ServiceSpec),
}

/// Parse a manifest document set.
pub fn parse(raw: &str) -> Result<Manifest, ParseError> {
    let mut deployment: Option<DeploymentSpec> = None;
    let mut services: Vec<(usize, ServiceSpec)> = Vec::new();

    for (index, doc) in serde_yaml::Deserializer::from_str(raw).enumerate() {
        let value = Value::deserialize(doc)
            .map_err(|e| ParseError::invalid("", Some(index), e.to_string()))?;

        // Empty documents (e.g. a trailing `---`)
        if value.is_null() {
            continue;
        }

        let kind = match value.get("kind") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(Value::Null) | None => return Err(ParseError::missing("kind", Some(index))),
            Some(_) => {
                return Err(ParseError::invalid("kind", Some(index), "expected a string"));
            }
        };

        match kind {
            "Deployment" => {
                if deployment.is_some() {
                    return Err(ParseError::invalid(
                        "kind",
                        Some(index),
                        "a manifest holds exactly one Deployment",
                    ));
                }
                deployment = Some(deployment::parse_deployment(&value, index)?);
            }
            "Service" => services.push((index, service::parse_service(&value, index)?)),
            other => {
                return Err(ParseError::invalid(
                    "kind",
                    Some(index),
                    format!("unknown kind `{}`, expected Deployment or Service", other),
                ));
            }
        }
    }

    let deployment = deployment.ok_or_else(|| {
        ParseError::new(
            ParseErrorKind::MissingField,
            "kind",
            None,
            "manifest contains no Deployment document",
        )
    })?;

    let mut names = HashSet::new();
    for (index, service) in &services {
        if service.selector != deployment.name {
            return Err(ParseError::new(
                ParseErrorKind::DanglingSelector,
                "selector",
                Some(*index),
                format!(
                    "service `{}` selects workload `{}`, which is not defined in this manifest",
                    service.name, service.selector
                ),
            ));
        }
        if !deployment.ports.is_empty() && !deployment.ports.contains(&service.target_port) {
            return Err(ParseError::invalid(
                "target_port",
                Some(*index),
                format!(
                    "target port {} is not exposed by workload `{}`",
                    service.target_port, deployment.name
                ),
            ));
        }
        if !names.insert(service.name.clone()) {
            return Err(ParseError::invalid(
                "name",
                Some(*index),
                format!("duplicate service `{}`", service.name),
            ));
        }
    }

    Ok(Manifest {
        deployment,
        services: services.into_iter().map(|(_, s)| s).collect(),
    })
}

impl Manifest {
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        parse(raw)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse(&raw).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize back into the multi-document form accepted by [`parse`].
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut docs = vec![serde_yaml::to_string(&Document::Deployment(&self.deployment))?];
        for service in &self.services {
            docs.push(serde_yaml::to_string(&Document::Service(service))?);
        }
        Ok(docs.join("---\n"))
    }

    /// Render as the Kubernetes `apps/v1` and `v1` objects the cluster receives.
    pub fn to_resource_yaml(&self) -> Result<String, serde_yaml::Error> {
        let mut docs = vec![serde_yaml::to_string(&render_deployment(&self.deployment))?];
        for service in &self.services {
            docs.push(serde_yaml::to_string(&render_service(service))?);
        }
        Ok(docs.join("---\n"))
    }
}
