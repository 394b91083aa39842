// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests image reference parsing, name validation, and identifier behavior.

use rollwright::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_name_without_tag_is_unresolvable() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert!(img.tag().is_none());
        assert!(!img.is_resolvable());
    }

    #[test]
    fn parse_name_with_tag() {
        let img = ImageRef::parse("nginx:1.25").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("1.25"));
        assert!(img.is_resolvable());
    }

    #[test]
    fn parse_with_registry() {
        let img = ImageRef::parse("registry.example.com/shop/web:1.4.2").unwrap();
        assert_eq!(img.registry(), Some("registry.example.com"));
        assert_eq!(img.name(), "shop/web");
        assert_eq!(img.repository(), "registry.example.com/shop/web");
    }

    #[test]
    fn parse_registry_with_port() {
        let img = ImageRef::parse("localhost:5000/web").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "web");
        assert!(img.tag().is_none());
    }

    #[test]
    fn parse_org_without_registry() {
        let img = ImageRef::parse("shop/web:2").unwrap();
        assert!(img.registry().is_none());
        assert_eq!(img.name(), "shop/web");
    }

    #[test]
    fn digest_is_resolvable() {
        let digest = "sha256:abc123def456";
        let img = ImageRef::parse(&format!("nginx@{}", digest)).unwrap();
        assert_eq!(img.digest(), Some(digest));
        assert!(img.tag().is_none());
        assert!(img.is_resolvable());
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1@sha256:abc123").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:abc123"));
        assert_eq!(img.to_string(), "ghcr.io/org/repo:v1@sha256:abc123");
    }

    #[test]
    fn with_tag_replaces_tag_and_digest() {
        let img = ImageRef::parse("shop/web:1@sha256:abc").unwrap();
        let retagged = img.with_tag("2").unwrap();
        assert_eq!(retagged.to_string(), "shop/web:2");
        assert!(img.with_tag("").is_err());
    }

    #[test]
    fn parse_errors() {
        assert_eq!(ImageRef::parse(""), Err(ParseImageRefError::Empty));
        assert_eq!(
            ImageRef::parse("invalid image!"),
            Err(ParseImageRefError::InvalidChar(' '))
        );
        assert_eq!(ImageRef::parse("web:"), Err(ParseImageRefError::EmptyTag));
    }

    #[test]
    fn serde_uses_display_form() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1").unwrap();
        let json = serde_json::to_string(&img).unwrap();
        assert_eq!(json, "\"ghcr.io/org/repo:v1\"");
        let back: ImageRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, img);
    }
}

mod name_tests {
    use super::*;

    #[test]
    fn valid_dns_name() {
        let name = WorkloadName::new("web-api").unwrap();
        assert_eq!(name.as_str(), "web-api");
        assert_eq!(name.to_string(), "web-api");
    }

    #[test]
    fn empty_returns_error() {
        assert_eq!(WorkloadName::new(""), Err(NameError::Empty));
    }

    #[test]
    fn too_long_returns_error() {
        let long_name = "a".repeat(64);
        assert_eq!(ServiceName::new(&long_name), Err(NameError::TooLong));
        assert!(ServiceName::new(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn hyphen_at_edges_returns_error() {
        assert_eq!(ServiceName::new("-web"), Err(NameError::StartsWithHyphen));
        assert_eq!(ServiceName::new("web-"), Err(NameError::EndsWithHyphen));
    }

    #[test]
    fn uppercase_returns_error() {
        assert_eq!(WorkloadName::new("Web"), Err(NameError::NotLowercase));
    }

    #[test]
    fn invalid_chars_returns_error() {
        assert_eq!(WorkloadName::new("web_api"), Err(NameError::InvalidChar('_')));
        assert!(WorkloadName::new("web.api").is_err());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<WorkloadName>("\"web\"").is_ok());
        assert!(serde_json::from_str::<WorkloadName>("\"Web\"").is_err());
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn rollout_id_stores_value() {
        let id = RolloutId::new("web-123".to_string());
        assert_eq!(id.as_str(), "web-123");
        assert_eq!(id.into_inner(), "web-123");
    }

    #[test]
    fn generated_id_carries_prefix() {
        let id = RunId::generate("run");
        assert!(id.as_str().starts_with("run-"), "{}", id);
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = RolloutId::new("web-1".to_string());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"web-1\"");
    }
}
