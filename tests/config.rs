// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, env var interpolation, discovery, and destination merging.

use rollwright::config::*;
use rollwright::error::Error;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
project: shop
manifests:
  - k8s/web.yml
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.project, "shop");
        assert_eq!(config.manifests.len(), 1);
        assert_eq!(config.manifests.head.path, PathBuf::from("k8s/web.yml"));
        assert!(config.build.is_none());
        assert!(config.verify);
        assert_eq!(config.rollout, RolloutConfig::default());
        assert!(config.rollback.automatic);
        assert_eq!(config.cluster.kubectl, "kubectl");
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
project: shop

build:
  command: mvn -B package
  artifact: target/shop.war
  env:
    MAVEN_OPTS: -Xmx1g

image:
  repository: registry.example.com/shop/web
  tag:
    env: BUILD_NUMBER
    default: dev
  dockerfile: docker/Dockerfile

manifests:
  - k8s/postgres.yml
  - path: k8s/web.yml
    use_published_image: true

rollout:
  timeout: 10m
  poll_interval: 5s
  retry:
    max_attempts: 3
    initial_backoff: 1s

rollback:
  automatic: false

cluster:
  context: prod-eu
  namespace: shop

verify: false
"#;
        let config = Config::from_yaml(yaml).unwrap();

        let build = config.build.as_ref().unwrap();
        assert_eq!(build.command, ["mvn", "-B", "package"]);
        assert_eq!(
            build.env.get("MAVEN_OPTS"),
            Some(&EnvValue::Literal("-Xmx1g".to_string()))
        );

        let image = config.image.as_ref().unwrap();
        assert_eq!(
            image.tag,
            EnvValue::FromEnv {
                var: "BUILD_NUMBER".to_string(),
                default: Some("dev".to_string()),
            }
        );
        assert_eq!(image.context, PathBuf::from("."));

        let entries: Vec<_> = config.manifests.iter().collect();
        assert_eq!(entries[0].use_published_image, None);
        assert_eq!(entries[1].use_published_image, Some(true));

        assert_eq!(config.rollout.timeout, Duration::from_secs(600));
        assert_eq!(config.rollout.poll_interval, Duration::from_secs(5));
        assert_eq!(config.rollout.retry.max_attempts, 3);
        assert_eq!(config.rollout.retry.initial_backoff, Duration::from_secs(1));

        let settings = config.rollout_settings();
        assert!(!settings.automatic_rollback);
        assert_eq!(settings.poll_interval, Duration::from_secs(5));

        assert_eq!(config.cluster.context.as_deref(), Some("prod-eu"));
        assert!(!config.verify);
    }

    #[test]
    fn build_command_accepts_argv() {
        let yaml = r#"
project: shop
build:
  command: ["sh", "-c", "make dist"]
  artifact: dist/app.tar
image:
  repository: shop/web
  tag: "1.0"
manifests: [k8s/web.yml]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.build.unwrap().command, ["sh", "-c", "make dist"]);
    }

    #[test]
    fn empty_manifest_list_returns_error() {
        let yaml = r#"
project: shop
manifests: []
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_field_returns_error() {
        let yaml = r#"
project: shop
manifests: [k8s/web.yml]
servers: [example.com]
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::Yaml(_)), "{err}");
    }

    #[test]
    fn zero_timeout_returns_error() {
        let yaml = r#"
project: shop
manifests: [k8s/web.yml]
rollout:
  timeout: 0s
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{err}");
    }

    #[test]
    fn published_image_requires_image_section() {
        let yaml = r#"
project: shop
manifests: [k8s/web.yml]
use_published_image: true
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("use_published_image"), "{err}");
    }

    #[test]
    fn build_requires_image_section() {
        let yaml = r#"
project: shop
build:
  command: make
  artifact: dist/app
manifests: [k8s/web.yml]
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(Error::InvalidConfig(_))
        ));
    }
}

mod env_vars {
    use super::*;

    const IMAGE_FROM_ENV: &str = r#"
project: shop
image:
  repository: registry.example.com/shop/web
  tag:
    env: ROLLWRIGHT_TEST_TAG
manifests: [k8s/web.yml]
"#;

    #[test]
    fn image_tag_from_environment() {
        let config = Config::from_yaml(IMAGE_FROM_ENV).unwrap();
        temp_env::with_var("ROLLWRIGHT_TEST_TAG", Some("42"), || {
            let image = config.image.as_ref().unwrap().image_ref().unwrap();
            assert_eq!(image.to_string(), "registry.example.com/shop/web:42");
        });
    }

    #[test]
    fn missing_variable_without_default_is_an_error() {
        let config = Config::from_yaml(IMAGE_FROM_ENV).unwrap();
        temp_env::with_var_unset("ROLLWRIGHT_TEST_TAG", || {
            let err = config.image.as_ref().unwrap().image_ref().unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref var) if var == "ROLLWRIGHT_TEST_TAG"));
        });
    }

    #[test]
    fn default_used_when_variable_unset() {
        let value = EnvValue::FromEnv {
            var: "ROLLWRIGHT_TEST_UNSET".to_string(),
            default: Some("fallback".to_string()),
        };
        temp_env::with_var_unset("ROLLWRIGHT_TEST_UNSET", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn resolve_env_values() {
        let mut map = std::collections::HashMap::new();
        map.insert("LITERAL".to_string(), EnvValue::from("plain"));
        map.insert(
            "FROM_ENV".to_string(),
            EnvValue::FromEnv {
                var: "ROLLWRIGHT_TEST_VAR".to_string(),
                default: None,
            },
        );

        temp_env::with_var("ROLLWRIGHT_TEST_VAR", Some("from_environment"), || {
            let resolved = resolve_env_map(&map).unwrap();
            assert_eq!(resolved["LITERAL"], "plain");
            assert_eq!(resolved["FROM_ENV"], "from_environment");
        });
    }
}

mod destinations {
    use super::*;

    const WITH_DESTINATIONS: &str = r#"
project: shop
manifests: [k8s/web.yml]
cluster:
  context: staging-eu
  namespace: shop
destinations:
  production:
    context: prod-eu
    timeout: 15m
    rollback:
      automatic: false
  sandbox:
    namespace: shop-sandbox
"#;

    #[test]
    fn destination_overrides_cluster_and_rollout() {
        let config = Config::from_yaml(WITH_DESTINATIONS).unwrap();
        let prod = config.for_destination("production").unwrap();

        assert_eq!(prod.cluster.context.as_deref(), Some("prod-eu"));
        assert_eq!(prod.cluster.namespace.as_deref(), Some("shop"));
        assert_eq!(prod.rollout.timeout, Duration::from_secs(900));
        assert!(!prod.rollback.automatic);
    }

    #[test]
    fn destination_keeps_unset_fields() {
        let config = Config::from_yaml(WITH_DESTINATIONS).unwrap();
        let sandbox = config.for_destination("sandbox").unwrap();

        assert_eq!(sandbox.cluster.context.as_deref(), Some("staging-eu"));
        assert_eq!(sandbox.cluster.namespace.as_deref(), Some("shop-sandbox"));
        assert_eq!(sandbox.rollout.timeout, config.rollout.timeout);
        assert!(sandbox.rollback.automatic);
    }

    #[test]
    fn unknown_destination_returns_error() {
        let config = Config::from_yaml(WITH_DESTINATIONS).unwrap();
        let err = config.for_destination("moon").unwrap_err();
        assert!(matches!(err, Error::UnknownDestination(ref name) if name == "moon"));
    }
}

mod discovery {
    use super::*;

    const PROJECT: &str = r#"
project: shop
manifests:
  - k8s/web.yml
  - path: k8s/worker.yml
    use_published_image: false
image:
  repository: shop/web
  tag: "7"
use_published_image: true
"#;

    const MANIFEST: &str = r#"
kind: Deployment
name: web
replicas: 1
image: shop/web:1
"#;

    #[test]
    fn discovers_config_and_resolves_manifests() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("k8s")).unwrap();
        fs::write(dir.path().join("rollwright.yml"), PROJECT).unwrap();
        fs::write(dir.path().join("k8s/web.yml"), MANIFEST).unwrap();
        fs::write(
            dir.path().join("k8s/worker.yml"),
            MANIFEST.replace("name: web", "name: worker"),
        )
        .unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.root, dir.path());

        let sources = config.load_manifests().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].path, dir.path().join("k8s/web.yml"));
        assert!(sources[0].use_published_image);
        assert_eq!(sources[1].manifest.deployment.name.as_str(), "worker");
        assert!(!sources[1].use_published_image);
    }

    #[test]
    fn discovers_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".rollwright")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), PROJECT).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.project, "shop");
        assert_eq!(config.root, dir.path());
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }

    #[test]
    fn broken_manifest_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("k8s")).unwrap();
        fs::write(dir.path().join("rollwright.yml"), PROJECT).unwrap();
        fs::write(
            dir.path().join("k8s/web.yml"),
            MANIFEST.replace("replicas: 1", "replicas: 0"),
        )
        .unwrap();

        let config = Config::discover(dir.path()).unwrap();
        let err = config.load_manifests().unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn publisher_uses_resolved_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rollwright.yml"), PROJECT).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        let publisher = config.publisher().unwrap().unwrap();
        assert_eq!(publisher.image().to_string(), "shop/web:7");
    }
}

mod template {
    use super::*;

    #[test]
    fn template_is_valid() {
        let config = Config::template();
        assert_eq!(config.project, "my-app");
        assert!(config.image.is_some());
        assert!(config.use_published_image);
    }
}
