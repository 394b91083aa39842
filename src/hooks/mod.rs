// ABOUTME: Hooks system for deployment lifecycle events.
// ABOUTME: Discovers and executes shell scripts at pre-deploy, post-deploy, and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::types::WorkloadName;

/// Hook execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the pipeline starts. Failure aborts the deploy.
    PreDeploy,
    /// After a successful pipeline run. Failure logs a warning.
    PostDeploy,
    /// After a failed pipeline run. Failure logs a warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort deployment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.filename())
    }
}

/// The stage that failed, for on-error hooks.
#[derive(Debug, Clone)]
pub struct HookFailure {
    pub stage: String,
    pub message: String,
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub project: String,
    pub destination: Option<String>,
    pub workloads: Vec<WorkloadName>,
    pub image: Option<String>,
    pub kube_context: Option<String>,
    pub run_id: Option<String>,
    pub failure: Option<HookFailure>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("ROLLWRIGHT_PROJECT".to_string(), self.project.clone());
        env.insert(
            "ROLLWRIGHT_WORKLOADS".to_string(),
            self.workloads
                .iter()
                .map(WorkloadName::as_str)
                .collect::<Vec<_>>()
                .join(","),
        );
        if let Some(ref destination) = self.destination {
            env.insert("ROLLWRIGHT_DESTINATION".to_string(), destination.clone());
        }
        if let Some(ref image) = self.image {
            env.insert("ROLLWRIGHT_IMAGE".to_string(), image.clone());
        }
        if let Some(ref context) = self.kube_context {
            env.insert("ROLLWRIGHT_KUBE_CONTEXT".to_string(), context.clone());
        }
        if let Some(ref run_id) = self.run_id {
            env.insert("ROLLWRIGHT_RUN_ID".to_string(), run_id.clone());
        }
        if let Some(ref failure) = self.failure {
            env.insert("ROLLWRIGHT_FAILED_STAGE".to_string(), failure.stage.clone());
            env.insert("ROLLWRIGHT_ERROR".to_string(), failure.message.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    project_dir: PathBuf,
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            hooks_dir: project_dir.join(".rollwright").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!(hook = point.filename(), path = %hook_path.display(), "running hook");

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!(hook = point.filename(), "hook completed");
                } else {
                    tracing::warn!(
                        hook = point.filename(),
                        exit_code = ?result.exit_code,
                        "hook failed"
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!(hook = point.filename(), error = %e, "failed to execute hook");
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HookContext {
        HookContext {
            project: "shop".to_string(),
            destination: Some("staging".to_string()),
            workloads: vec![
                WorkloadName::new("postgres").unwrap(),
                WorkloadName::new("web").unwrap(),
            ],
            image: Some("registry.example.com/shop/web:42".to_string()),
            kube_context: None,
            run_id: None,
            failure: None,
        }
    }

    #[test]
    fn hook_point_filenames() {
        assert_eq!(HookPoint::PreDeploy.filename(), "pre-deploy");
        assert_eq!(HookPoint::PostDeploy.filename(), "post-deploy");
        assert_eq!(HookPoint::OnError.filename(), "on-error");
    }

    #[test]
    fn pre_deploy_is_fatal() {
        assert!(HookPoint::PreDeploy.is_fatal());
        assert!(!HookPoint::PostDeploy.is_fatal());
        assert!(!HookPoint::OnError.is_fatal());
    }

    #[test]
    fn hook_context_to_env() {
        let env = context().to_env();
        assert_eq!(env.get("ROLLWRIGHT_PROJECT"), Some(&"shop".to_string()));
        assert_eq!(
            env.get("ROLLWRIGHT_WORKLOADS"),
            Some(&"postgres,web".to_string())
        );
        assert_eq!(
            env.get("ROLLWRIGHT_DESTINATION"),
            Some(&"staging".to_string())
        );
        assert!(!env.contains_key("ROLLWRIGHT_KUBE_CONTEXT"));
        assert!(!env.contains_key("ROLLWRIGHT_ERROR"));
    }

    #[test]
    fn failure_is_exposed_to_on_error_hooks() {
        let mut context = context();
        context.failure = Some(HookFailure {
            stage: "publish".to_string(),
            message: "push denied".to_string(),
        });

        let env = context.to_env();
        assert_eq!(
            env.get("ROLLWRIGHT_FAILED_STAGE"),
            Some(&"publish".to_string())
        );
        assert_eq!(env.get("ROLLWRIGHT_ERROR"), Some(&"push denied".to_string()));
    }

    #[test]
    fn hook_runner_checks_hooks_dir() {
        let runner = HookRunner::new(Path::new("/nonexistent"));
        assert!(!runner.hook_exists(HookPoint::PreDeploy));
    }
}
