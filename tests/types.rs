// ABOUTME: Integration tests for validated identifiers.
// ABOUTME: Tests parsing, validation, serde round-trips, and generated inputs.

use kiln::types::*;
use proptest::prelude::*;

mod resource_id_tests {
    use super::*;

    #[test]
    fn accepts_paths_and_spaces() {
        let id = ResourceId::new("web/api gateway").unwrap();
        assert_eq!(id.as_str(), "web/api gateway");
        assert_eq!(id.to_string(), "web/api gateway");
    }

    #[test]
    fn deserialize_validates() {
        let ok: ResourceId = serde_json::from_str("\"db\"").unwrap();
        assert_eq!(ok.as_str(), "db");
        assert!(serde_json::from_str::<ResourceId>("\"\"").is_err());
    }

    #[test]
    fn ids_order_lexically() {
        let mut ids = vec![
            ResourceId::new("b").unwrap(),
            ResourceId::new("a").unwrap(),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }
}

mod resource_type_tests {
    use super::*;

    #[test]
    fn namespace_is_prefix_before_double_colon() {
        let t = ResourceType::new("docker::Container").unwrap();
        assert_eq!(t.namespace(), Some("docker"));
        assert_eq!(ResourceType::new("Bucket").unwrap().namespace(), None);
    }

    #[test]
    fn rejects_whitespace() {
        assert!(matches!(
            ResourceType::new("docker Container"),
            Err(ResourceTypeError::InvalidChar(' '))
        ));
    }
}

mod scope_id_tests {
    use super::*;

    #[test]
    fn for_stage_joins_with_hyphen() {
        let scope = ScopeId::for_stage("shop", "prod").unwrap();
        assert_eq!(scope.as_str(), "shop-prod");
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(ScopeId::new("../etc").is_err());
        assert!(ScopeId::new("a/b").is_err());
        assert!(matches!(
            ScopeId::new(".hidden"),
            Err(ScopeIdError::StartsWithDot)
        ));
    }

    #[test]
    fn rejects_too_long() {
        assert!(matches!(
            ScopeId::new(&"a".repeat(129)),
            Err(ScopeIdError::TooLong)
        ));
    }
}

proptest! {
    #[test]
    fn valid_scope_ids_are_accepted(s in "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,100}") {
        let scope = ScopeId::new(&s).unwrap();
        prop_assert_eq!(scope.as_str(), s.as_str());
    }

    #[test]
    fn scope_ids_never_contain_separators(s in "\\PC{1,40}") {
        if let Ok(scope) = ScopeId::new(&s) {
            prop_assert!(!scope.as_str().contains('/'));
            prop_assert!(!scope.as_str().contains('\\'));
            prop_assert!(!scope.as_str().starts_with('.'));
        }
    }

    #[test]
    fn printable_resource_ids_round_trip_through_json(s in "\\PC{1,64}") {
        let id = ResourceId::new(&s).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, id);
    }
}
