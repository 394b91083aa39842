// ABOUTME: ClusterClient implementation that drives a cluster through the kubectl CLI.
// ABOUTME: Pipes rendered JSON to `kubectl apply` and reads status from `kubectl get -o json`.

use async_trait::async_trait;
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::client::{
    ApplyOutcome, ClusterClient, Resource, ResourceRef, ServiceStatus, WorkloadCondition,
    WorkloadStatus,
};
use super::error::ClusterError;
use super::render::{APP_LABEL, render_deployment, render_service};
use crate::manifest::Exposure;
use crate::types::{ServiceName, WorkloadName};

/// Container restarts after which a crash-looping pod counts as failed.
const CRASH_RESTART_THRESHOLD: u32 = 3;

/// Waiting reasons that never resolve without a new spec.
const IMAGE_FAILURE_REASONS: &[&str] = &["ErrImagePull", "ImagePullBackOff", "InvalidImageName"];

/// stderr fragments that indicate a transport problem rather than a rejection.
const UNREACHABLE_MARKERS: &[&str] = &[
    "unable to connect to the server",
    "connection refused",
    "i/o timeout",
    "tls handshake timeout",
    "no route to host",
    "the server is currently unable to handle the request",
    "context deadline exceeded",
];

/// Failures running kubectl itself, before its answer can be interpreted.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KubectlError {
    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {resource} to kubectl: {source}"))]
    Stdin {
        resource: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to render {resource}: {source}"))]
    Encode {
        resource: String,
        source: serde_json::Error,
    },

    #[snafu(display("unexpected kubectl output for {resource}: {source}"))]
    Decode {
        resource: String,
        source: serde_json::Error,
    },
}

impl From<KubectlError> for ClusterError {
    fn from(err: KubectlError) -> Self {
        match &err {
            KubectlError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ClusterError::Rejected(err.to_string())
            }
            KubectlError::Spawn { .. } | KubectlError::Stdin { .. } => {
                ClusterError::Unreachable(err.to_string())
            }
            KubectlError::Encode { .. } | KubectlError::Decode { .. } => {
                ClusterError::Rejected(err.to_string())
            }
        }
    }
}

/// A cluster reached through the `kubectl` binary.
#[derive(Debug, Clone)]
pub struct KubectlCluster {
    program: String,
    context: Option<String>,
    namespace: Option<String>,
}

struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl KubectlCluster {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            context: None,
            namespace: None,
        }
    }

    pub fn context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(ref context) = self.context {
            cmd.arg("--context").arg(context);
        }
        if let Some(ref namespace) = self.namespace {
            cmd.arg("--namespace").arg(namespace);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, args: &[&str], stdin: Option<(&str, Vec<u8>)>) -> Result<CommandOutput, KubectlError> {
        let mut cmd = self.command(args);
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        tracing::debug!(program = %self.program, ?args, "running kubectl");

        let mut child = cmd.spawn().context(SpawnSnafu {
            program: self.program.clone(),
        })?;

        if let Some((resource, body)) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(&body).await.context(StdinSnafu { resource })?;
            // Closing stdin lets kubectl see end of input
            drop(pipe);
        }

        let output = child.wait_with_output().await.context(SpawnSnafu {
            program: self.program.clone(),
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        args: &[&str],
        resource: &str,
    ) -> Result<T, ClusterError> {
        let output = self.run(args, None).await?;
        if !output.success {
            return Err(classify_failure(&output.stderr));
        }
        let value = serde_json::from_str(&output.stdout).context(DecodeSnafu { resource })?;
        Ok(value)
    }

    /// Look for pods that will not become ready on their own.
    async fn pod_failure(&self, workload: &WorkloadName) -> Result<Option<String>, ClusterError> {
        let selector = format!("{}={}", APP_LABEL, workload);
        let pods: PodList = self
            .get_json(
                &["get", "pods", "-l", &selector, "-o", "json"],
                &format!("pods of {}", workload),
            )
            .await?;
        Ok(failure_from_pods(&pods))
    }
}

#[async_trait]
impl ClusterClient for KubectlCluster {
    async fn apply(&self, resource: Resource<'_>) -> Result<ApplyOutcome, ClusterError> {
        let target = resource.to_ref().to_string();
        let document = match resource {
            Resource::Deployment(spec) => render_deployment(spec),
            Resource::Service(spec) => render_service(spec),
        };
        let body = serde_json::to_vec(&document).context(EncodeSnafu {
            resource: target.clone(),
        })?;

        let output = self
            .run(&["apply", "-f", "-"], Some((target.as_str(), body)))
            .await?;
        if !output.success {
            return Err(classify_failure(&output.stderr));
        }

        let outcome = parse_apply_outcome(&output.stdout);
        tracing::debug!(resource = %target, %outcome, "applied");
        Ok(outcome)
    }

    async fn status(&self, workload: &WorkloadName) -> Result<WorkloadStatus, ClusterError> {
        let name = format!("deployment/{}", workload);
        let deployment: DeploymentObject = self
            .get_json(&["get", &name, "-o", "json"], &name)
            .await?;

        let mut status = status_from_deployment(&deployment);
        if status.ready_replicas < status.desired_replicas
            && !matches!(status.condition, WorkloadCondition::Failed { .. })
            && let Some(reason) = self.pod_failure(workload).await?
        {
            status.condition = WorkloadCondition::Failed { reason };
        }
        Ok(status)
    }

    async fn describe_service(
        &self,
        service: &ServiceName,
    ) -> Result<ServiceStatus, ClusterError> {
        let name = format!("service/{}", service);
        let object: ServiceObject = self.get_json(&["get", &name, "-o", "json"], &name).await?;

        let port = object
            .spec
            .ports
            .first()
            .ok_or_else(|| ClusterError::NotFound(format!("{} exposes no ports", name)))?;
        let target_port = match &port.target_port {
            Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            None => Some(port.port),
            Some(_) => None,
        }
        .ok_or_else(|| ClusterError::Rejected(format!("{} uses a named target port", name)))?;

        let exposure = match object.spec.service_type.as_deref() {
            Some("LoadBalancer") | Some("NodePort") => Exposure::External,
            _ => Exposure::Internal,
        };

        Ok(ServiceStatus {
            port: port.port,
            target_port,
            exposure,
        })
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<(), ClusterError> {
        let name = resource.to_string();
        let output = self.run(&["delete", &name], None).await?;
        if !output.success {
            return Err(classify_failure(&output.stderr));
        }
        Ok(())
    }
}

fn classify_failure(stderr: &str) -> ClusterError {
    let message = stderr.trim().to_string();
    let lower = message.to_lowercase();
    if UNREACHABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        ClusterError::Unreachable(message)
    } else if lower.contains("notfound") || lower.contains("not found") {
        ClusterError::NotFound(message)
    } else {
        ClusterError::Rejected(message)
    }
}

/// kubectl reports `<kind>/<name> created|configured|unchanged`.
fn parse_apply_outcome(stdout: &str) -> ApplyOutcome {
    match stdout.split_whitespace().last() {
        Some("created") => ApplyOutcome::Created,
        Some("unchanged") => ApplyOutcome::Unchanged,
        _ => ApplyOutcome::Configured,
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentObject {
    metadata: ObjectMeta,
    spec: DeploymentObjectSpec,
    #[serde(default)]
    status: DeploymentObjectStatus,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    generation: i64,
}

#[derive(Debug, Deserialize)]
struct DeploymentObjectSpec {
    #[serde(default = "one")]
    replicas: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentObjectStatus {
    #[serde(default)]
    observed_generation: i64,
    #[serde(default)]
    updated_replicas: u32,
    #[serde(default)]
    ready_replicas: u32,
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(rename = "type")]
    kind: String,
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

fn status_from_deployment(deployment: &DeploymentObject) -> WorkloadStatus {
    let desired = deployment.spec.replicas;
    let status = &deployment.status;

    // Until the controller has observed the latest generation, counts describe the old spec
    let ready = if status.observed_generation < deployment.metadata.generation {
        0
    } else {
        status.updated_replicas.min(status.ready_replicas)
    };

    let failed = status.conditions.iter().find_map(|c| {
        let deadline = c.kind == "Progressing"
            && c.status == "False"
            && c.reason.as_deref() == Some("ProgressDeadlineExceeded");
        let replica_failure = c.kind == "ReplicaFailure" && c.status == "True";
        (deadline || replica_failure)
            .then(|| c.reason.clone().unwrap_or_else(|| c.kind.clone()))
    });

    let condition = match failed {
        Some(reason) => WorkloadCondition::Failed { reason },
        None if ready >= desired => WorkloadCondition::Available,
        None => WorkloadCondition::Progressing,
    };

    WorkloadStatus {
        desired_replicas: desired,
        ready_replicas: ready,
        condition,
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    restart_count: u32,
    #[serde(default)]
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerState {
    #[serde(default)]
    waiting: Option<WaitingState>,
}

#[derive(Debug, Deserialize)]
struct WaitingState {
    #[serde(default)]
    reason: Option<String>,
}

/// A workload has failed when every unready pod is stuck: an image that cannot
/// be pulled, or a crash loop that has already restarted several times.
fn failure_from_pods(pods: &PodList) -> Option<String> {
    let mut stuck_reason = None;
    let mut unready = 0;

    for pod in &pods.items {
        let Some(container) = pod.status.container_statuses.iter().find(|c| !c.ready) else {
            continue;
        };
        unready += 1;

        let reason = container
            .state
            .waiting
            .as_ref()
            .and_then(|w| w.reason.as_deref());
        let stuck = match reason {
            Some(r) if IMAGE_FAILURE_REASONS.contains(&r) => true,
            Some("CrashLoopBackOff") => container.restart_count >= CRASH_RESTART_THRESHOLD,
            _ => false,
        };
        if !stuck {
            return None;
        }
        stuck_reason = reason.map(str::to_string);
    }

    if unready == 0 { None } else { stuck_reason }
}

#[derive(Debug, Deserialize)]
struct ServiceObject {
    spec: ServiceObjectSpec,
}

#[derive(Debug, Deserialize)]
struct ServiceObjectSpec {
    #[serde(rename = "type", default)]
    service_type: Option<String>,
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Debug, Deserialize)]
struct ServicePort {
    port: u16,
    #[serde(rename = "targetPort", default)]
    target_port: Option<serde_json::Value>,
}
