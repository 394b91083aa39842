// ABOUTME: Integration tests for hooks system.
// ABOUTME: Tests hook discovery, execution, environment variables, and deploy abort on failure.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use rollwright::history::STATE_DIR_ENV;
use rollwright::hooks::{HookContext, HookFailure, HookPoint, HookRunner};
use rollwright::types::WorkloadName;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

fn create_hook(dir: &TempDir, name: &str, script: &str) {
    let hooks_dir = dir.path().join(".rollwright").join("hooks");
    fs::create_dir_all(&hooks_dir).unwrap();

    let hook_path = hooks_dir.join(name);
    fs::write(&hook_path, script).unwrap();

    // Make executable
    let mut perms = fs::metadata(&hook_path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&hook_path, perms).unwrap();
}

fn test_context() -> HookContext {
    HookContext {
        project: "shop".to_string(),
        destination: Some("production".to_string()),
        workloads: vec![
            WorkloadName::new("postgres").unwrap(),
            WorkloadName::new("web").unwrap(),
        ],
        image: Some("registry.example.com/shop/web:42".to_string()),
        kube_context: Some("prod-eu".to_string()),
        run_id: Some("run-1700000000000".to_string()),
        failure: None,
    }
}

/// Test: hooks run from the project directory.
#[tokio::test]
async fn hook_runs_in_project_directory() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(&temp_dir, "post-deploy", "#!/bin/sh\npwd\nexit 0\n");

    let runner = HookRunner::new(temp_dir.path());
    assert!(runner.hook_exists(HookPoint::PostDeploy));

    let result = runner
        .run(HookPoint::PostDeploy, &test_context())
        .await
        .unwrap();
    assert!(result.success);

    let reported = fs::canonicalize(result.stdout.trim()).unwrap();
    assert_eq!(reported, fs::canonicalize(temp_dir.path()).unwrap());
}

/// Test: Hook failure in pre-deploy is detectable.
#[tokio::test]
async fn pre_deploy_failure_detected() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "pre-deploy",
        "#!/bin/sh\necho 'cluster frozen' >&2\nexit 3\n",
    );

    let runner = HookRunner::new(temp_dir.path());
    let result = runner
        .run(HookPoint::PreDeploy, &test_context())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.stderr.contains("cluster frozen"));
}

/// Test: Hook receives the run's environment variables.
#[tokio::test]
async fn hook_receives_environment_variables() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "post-deploy",
        r#"#!/bin/sh
echo "PROJECT=$ROLLWRIGHT_PROJECT"
echo "WORKLOADS=$ROLLWRIGHT_WORKLOADS"
echo "DESTINATION=$ROLLWRIGHT_DESTINATION"
echo "IMAGE=$ROLLWRIGHT_IMAGE"
echo "CONTEXT=$ROLLWRIGHT_KUBE_CONTEXT"
echo "RUN=$ROLLWRIGHT_RUN_ID"
exit 0
"#,
    );

    let runner = HookRunner::new(temp_dir.path());
    let result = runner
        .run(HookPoint::PostDeploy, &test_context())
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.stdout.contains("PROJECT=shop"));
    assert!(result.stdout.contains("WORKLOADS=postgres,web"));
    assert!(result.stdout.contains("DESTINATION=production"));
    assert!(result.stdout.contains("IMAGE=registry.example.com/shop/web:42"));
    assert!(result.stdout.contains("CONTEXT=prod-eu"));
    assert!(result.stdout.contains("RUN=run-1700000000000"));
}

/// Test: on-error hooks learn which stage failed and why.
#[tokio::test]
async fn on_error_hook_receives_failure() {
    let temp_dir = TempDir::new().unwrap();
    create_hook(
        &temp_dir,
        "on-error",
        "#!/bin/sh\necho \"$ROLLWRIGHT_FAILED_STAGE: $ROLLWRIGHT_ERROR\"\n",
    );

    let mut context = test_context();
    context.failure = Some(HookFailure {
        stage: "deploy-web".to_string(),
        message: "rollout timed out".to_string(),
    });

    let runner = HookRunner::new(temp_dir.path());
    let result = runner.run(HookPoint::OnError, &context).await.unwrap();

    assert!(result.success);
    assert_eq!(result.stdout.trim(), "deploy-web: rollout timed out");
}

/// Test: Missing hook returns None.
#[tokio::test]
async fn missing_hook_returns_none() {
    let temp_dir = TempDir::new().unwrap();

    let runner = HookRunner::new(temp_dir.path());
    assert!(!runner.hook_exists(HookPoint::PreDeploy));

    let result = runner.run(HookPoint::PreDeploy, &test_context()).await;
    assert!(result.is_none());
}

/// Test: a failing pre-deploy hook stops the deploy before the cluster is touched.
#[test]
fn failing_pre_deploy_hook_aborts_deploy() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("k8s")).unwrap();
    fs::write(
        temp_dir.path().join("rollwright.yml"),
        "project: shop\nmanifests: [k8s/web.yml]\ncluster:\n  kubectl: /nonexistent/kubectl\n",
    )
    .unwrap();
    fs::write(temp_dir.path().join("k8s/web.yml"), support::WEB_MANIFEST).unwrap();
    create_hook(&temp_dir, "pre-deploy", "#!/bin/sh\nexit 1\n");

    Command::new(assert_cmd::cargo::cargo_bin!("rollwright"))
        .current_dir(temp_dir.path())
        .env(STATE_DIR_ENV, temp_dir.path().join("state"))
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("pre-deploy hook failed"));
}
