// ABOUTME: Integration tests for manifest parsing and serialization.
// ABOUTME: Covers validation errors with field paths and property-based round trips.

mod support;

use proptest::prelude::*;
use rollwright::manifest::{
    DeploymentSpec, EnvSource, Exposure, Manifest, ParseErrorKind, SecretRef, ServiceSpec,
};
use rollwright::types::{ImageRef, ServiceName, WorkloadName};
use support::WEB_MANIFEST;

mod validation {
    use super::*;

    #[test]
    fn dangling_selector_names_selector_field() {
        let raw = WEB_MANIFEST.replace("selector: web", "selector: x");
        let err = Manifest::parse(&raw).unwrap_err();

        assert_eq!(err.kind, ParseErrorKind::DanglingSelector);
        assert_eq!(err.field, "selector");
        assert_eq!(err.document, Some(1));
    }

    #[test]
    fn zero_replicas_is_invalid() {
        let raw = WEB_MANIFEST.replace("replicas: 2", "replicas: 0");
        let err = Manifest::parse(&raw).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidValue);
        assert_eq!(err.field, "replicas");
    }

    #[test]
    fn missing_image_is_reported() {
        let raw = WEB_MANIFEST.replace("image: registry.example.com/shop/web:1.4.2\n", "");
        let err = Manifest::parse(&raw).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
        assert_eq!(err.field, "image");
        assert_eq!(err.document, Some(0));
    }

    #[test]
    fn untagged_image_is_invalid() {
        let raw = WEB_MANIFEST.replace(":1.4.2", "");
        let err = Manifest::parse(&raw).unwrap_err();
        assert_eq!(err.field, "image");
    }

    #[test]
    fn unknown_exposure_is_invalid() {
        let raw = WEB_MANIFEST.replace("exposure: external", "exposure: public");
        let err = Manifest::parse(&raw).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidValue);
        assert_eq!(err.field, "exposure");
    }

    #[test]
    fn out_of_range_port_is_invalid() {
        let raw = WEB_MANIFEST.replace("port: 80\n", "port: 70000\n");
        let err = Manifest::parse(&raw).unwrap_err();
        assert_eq!(err.field, "port");
        assert_eq!(err.document, Some(1));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let raw = WEB_MANIFEST.replace("replicas: 2", "replicas: 2\nvolumes: []");
        assert!(Manifest::parse(&raw).is_err());
    }

    #[test]
    fn second_deployment_is_rejected() {
        let raw = format!(
            "{}---\nkind: Deployment\nname: api\nreplicas: 1\nimage: shop/api:1\n",
            WEB_MANIFEST
        );
        let err = Manifest::parse(&raw).unwrap_err();
        assert_eq!(err.field, "kind");
        assert_eq!(err.document, Some(2));
    }

    #[test]
    fn service_only_set_needs_a_deployment() {
        let raw = "kind: Service\nname: web\nselector: web\nport: 80\ntarget_port: 8080\nexposure: internal\n";
        let err = Manifest::parse(raw).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::MissingField);
    }

    #[test]
    fn load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web.yml");
        std::fs::write(&path, "kind: Deployment\nname: web\n").unwrap();

        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("web.yml"), "{err}");
        assert_eq!(err.parse_error().unwrap().kind, ParseErrorKind::MissingField);
    }
}

// =============================================================================
// Round trips
// =============================================================================

fn workload_name() -> impl Strategy<Value = String> {
    "w[a-z0-9-]{0,10}[a-z0-9]"
}

fn image() -> impl Strategy<Value = ImageRef> {
    (
        prop::option::of("[a-z]{2,6}\\.example\\.com"),
        "[a-z]{1,8}(/[a-z]{1,8})?",
        "[a-z0-9][a-z0-9.]{0,6}",
    )
        .prop_map(|(registry, name, tag)| {
            let raw = match registry {
                Some(registry) => format!("{}/{}:{}", registry, name, tag),
                None => format!("{}:{}", name, tag),
            };
            ImageRef::parse(&raw).unwrap()
        })
}

fn env_source() -> impl Strategy<Value = EnvSource> {
    prop_oneof![
        "v[a-z0-9_/-]{0,12}".prop_map(EnvSource::Value),
        ("s[a-z0-9-]{0,8}", "k[a-z0-9_]{0,8}").prop_map(|(name, key)| {
            EnvSource::Secret(SecretRef { name, key })
        }),
    ]
}

fn manifest() -> impl Strategy<Value = Manifest> {
    (
        workload_name(),
        1u32..50,
        image(),
        prop::collection::btree_map("E_[A-Z0-9_]{0,8}", env_source(), 0..5),
        prop::collection::btree_set(1u16..=65535, 1..4),
        prop::collection::vec((1u16..=65535, any::<bool>()), 0..3),
    )
        .prop_map(|(name, replicas, image, env, ports, services)| {
            let workload = WorkloadName::new(&name).unwrap();
            let ports: Vec<u16> = ports.into_iter().collect();

            let mut deployment = DeploymentSpec::new(workload.clone(), image, replicas);
            for (var, source) in env {
                deployment = deployment.with_env(var, source);
            }
            for &port in &ports {
                deployment = deployment.with_port(port);
            }

            let services = services
                .into_iter()
                .enumerate()
                .map(|(i, (port, external))| ServiceSpec {
                    name: ServiceName::new(&format!("{}-svc{}", name, i)).unwrap(),
                    selector: workload.clone(),
                    port,
                    target_port: ports[i % ports.len()],
                    exposure: if external {
                        Exposure::External
                    } else {
                        Exposure::Internal
                    },
                })
                .collect();

            Manifest {
                deployment,
                services,
            }
        })
}

proptest! {
    #[test]
    fn parse_serialize_parse_is_lossless(manifest in manifest()) {
        let yaml = manifest.to_yaml().unwrap();
        let parsed = Manifest::parse(&yaml).unwrap();
        prop_assert_eq!(parsed, manifest);
    }
}
