// ABOUTME: Renders manifest specs as Kubernetes API objects.
// ABOUTME: Produces apps/v1 Deployment and v1 Service documents as JSON.

use serde_json::{Value, json};

use crate::manifest::{DeploymentSpec, EnvSource, Exposure, ServiceSpec};

/// Label every rendered object carries so the selector can find its pods.
pub const APP_LABEL: &str = "app";
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGER: &str = "rollwright";

pub fn render_deployment(spec: &DeploymentSpec) -> Value {
    let env: Vec<Value> = spec
        .env
        .iter()
        .map(|binding| match &binding.source {
            EnvSource::Value(value) => json!({ "name": binding.name, "value": value }),
            EnvSource::Secret(secret) => json!({
                "name": binding.name,
                "valueFrom": {
                    "secretKeyRef": { "name": secret.name, "key": secret.key }
                }
            }),
        })
        .collect();

    let ports: Vec<Value> = spec
        .ports
        .iter()
        .map(|port| json!({ "containerPort": port }))
        .collect();

    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.name.as_str(),
            "labels": {
                APP_LABEL: spec.name.as_str(),
                MANAGED_BY_LABEL: MANAGER,
            }
        },
        "spec": {
            "replicas": spec.replicas,
            "selector": { "matchLabels": { APP_LABEL: spec.name.as_str() } },
            "template": {
                "metadata": { "labels": { APP_LABEL: spec.name.as_str() } },
                "spec": {
                    "containers": [{
                        "name": spec.name.as_str(),
                        "image": spec.image.to_string(),
                        "env": env,
                        "ports": ports,
                    }]
                }
            }
        }
    })
}

pub fn render_service(spec: &ServiceSpec) -> Value {
    let service_type = match spec.exposure {
        Exposure::Internal => "ClusterIP",
        Exposure::External => "LoadBalancer",
    };

    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": spec.name.as_str(),
            "labels": { MANAGED_BY_LABEL: MANAGER }
        },
        "spec": {
            "type": service_type,
            "selector": { APP_LABEL: spec.selector.as_str() },
            "ports": [{ "port": spec.port, "targetPort": spec.target_port }]
        }
    })
}
