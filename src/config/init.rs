// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a rollwright.yml template file.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(
    dir: &Path,
    project: Option<&str>,
    repository: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(p) = project {
        if p.trim().is_empty() {
            return Err(Error::InvalidConfig("project must not be empty".to_string()));
        }
        config.project = p.to_string();
    }

    if let (Some(r), Some(image)) = (repository, config.image.as_mut()) {
        image.repository = r.to_string();
        // Catch bad repositories now rather than at the first deploy
        image.image_ref()?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let repository = config
        .image
        .as_ref()
        .map(|i| i.repository.as_str())
        .unwrap_or("registry.example.com/my-app");
    let manifest = config.manifests.first().path.display();
    format!(
        r#"project: {project}

build:
  command: mvn -B package
  artifact: target/{project}.war

image:
  repository: {repository}
  tag:
    env: BUILD_NUMBER
    default: latest

# Deployed in order; put dependencies such as the database first.
manifests:
  - {manifest}

use_published_image: true

rollout:
  timeout: 5m
  poll_interval: 3s

rollback:
  automatic: true

# cluster:
#   context: my-cluster
#   namespace: {project}

# destinations:
#   staging:
#     context: staging-cluster
#     timeout: 10m
"#,
        project = config.project,
        repository = repository,
        manifest = manifest,
    )
}
