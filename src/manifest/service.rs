// ABOUTME: ServiceSpec exposure rules bound to a workload by selector.
// ABOUTME: Parsed from `kind: Service` documents.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;

use super::error::ParseError;
use super::fields::Fields;
use crate::types::{ServiceName, WorkloadName};

/// Exposure class of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    /// Reachable only inside the cluster.
    Internal,
    /// Reachable from outside the cluster through a load balancer.
    External,
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposure::Internal => write!(f, "internal"),
            Exposure::External => write!(f, "external"),
        }
    }
}

/// How a workload is exposed on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: ServiceName,
    pub selector: WorkloadName,
    pub port: u16,
    pub target_port: u16,
    pub exposure: Exposure,
}

const SERVICE_FIELDS: &[&str] = &["kind", "name", "selector", "port", "target_port", "exposure"];

pub(super) fn parse_service(value: &Value, document: usize) -> Result<ServiceSpec, ParseError> {
    let fields = Fields::new(value, "", document)?;
    fields.deny_unknown(SERVICE_FIELDS)?;

    let name = ServiceName::new(fields.required_str("name")?)
        .map_err(|e| fields.invalid("name", e.to_string()))?;

    // Whether the selector resolves is checked once the whole set is read.
    let selector = WorkloadName::new(fields.required_str("selector")?)
        .map_err(|e| fields.invalid("selector", e.to_string()))?;

    let port = fields.required_port("port")?;
    let target_port = fields.required_port("target_port")?;

    let exposure = match fields.required_str("exposure")? {
        "internal" => Exposure::Internal,
        "external" => Exposure::External,
        other => {
            return Err(fields.invalid(
                "exposure",
                format!("unknown exposure `{}`, expected internal or external", other),
            ));
        }
    };

    Ok(ServiceSpec {
        name,
        selector,
        port,
        target_port,
        exposure,
    })
}
