// ABOUTME: Test support utilities.
// ABOUTME: Shared tracing setup and manifest fixtures for integration tests.

use std::sync::Once;

use rollwright::manifest::DeploymentSpec;
use rollwright::types::{ImageRef, WorkloadName};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("rollwright=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A `web` deployment running `image` with the given replica count.
#[allow(dead_code)]
pub fn web_spec(image: &str, replicas: u32) -> DeploymentSpec {
    DeploymentSpec::new(
        WorkloadName::new("web").unwrap(),
        ImageRef::parse(image).unwrap(),
        replicas,
    )
    .with_port(8080)
}

/// A manifest with a `web` deployment and one external service.
#[allow(dead_code)]
pub const WEB_MANIFEST: &str = r#"kind: Deployment
name: web
replicas: 2
image: registry.example.com/shop/web:1.4.2
ports:
  - 8080
---
kind: Service
name: web
selector: web
port: 80
target_port: 8080
exposure: external
"#;
