// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests parsing, validation, and rounding properties of replica quantities.

use proptest::prelude::*;
use rollwatch::types::*;

mod service_name_tests {
    use super::*;

    #[test]
    fn valid_dns_name() {
        let name = ServiceName::new("enrichment-api").unwrap();
        assert_eq!(name.as_str(), "enrichment-api");
    }

    #[test]
    fn empty_returns_error() {
        assert!(ServiceName::new("").is_err());
    }

    #[test]
    fn too_long_returns_error() {
        let long_name = "a".repeat(64);
        assert!(ServiceName::new(&long_name).is_err());
    }

    #[test]
    fn starts_with_hyphen_returns_error() {
        assert!(ServiceName::new("-service").is_err());
    }

    #[test]
    fn ends_with_hyphen_returns_error() {
        assert!(ServiceName::new("service-").is_err());
    }

    #[test]
    fn uppercase_returns_error() {
        assert!(ServiceName::new("MyService").is_err());
    }

    #[test]
    fn valid_63_chars() {
        let name = "a".repeat(63);
        assert!(ServiceName::new(&name).is_ok());
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn instance_id_stores_value() {
        let id = InstanceId::new("sim-1");
        assert_eq!(id.as_str(), "sim-1");
        assert_eq!(id.to_string(), "sim-1");
    }

    #[test]
    fn revision_id_accepts_commit_hashes_and_tags() {
        assert!(RevisionId::parse("3f2c1ab9e").is_ok());
        assert!(RevisionId::parse("v1.4.2-rc.1").is_ok());
        assert!(RevisionId::parse("build_1042").is_ok());
    }

    #[test]
    fn revision_id_rejects_label_unsafe_values() {
        assert!(RevisionId::parse("").is_err());
        assert!(RevisionId::parse("feature/login").is_err());
        assert!(RevisionId::parse(&"a".repeat(129)).is_err());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&RevisionId::new("v2")).unwrap();
        assert_eq!(json, "\"v2\"");
    }
}

mod quantity_tests {
    use super::*;

    #[test]
    fn percent_rounding_follows_direction() {
        let q = Quantity::Percent(25);
        assert_eq!(q.resolve(3, Rounding::Up), 1);
        assert_eq!(q.resolve(3, Rounding::Down), 0);
        assert_eq!(q.resolve(4, Rounding::Up), 1);
        assert_eq!(q.resolve(4, Rounding::Down), 1);
    }

    #[test]
    fn absolute_ignores_total() {
        assert_eq!(Quantity::Absolute(2).resolve(10, Rounding::Up), 2);
    }

    #[test]
    fn parse_and_display_agree() {
        for raw in ["0", "3", "25%", "100%"] {
            let q: Quantity = raw.parse().unwrap();
            assert_eq!(q.to_string(), raw);
        }
    }

    proptest! {
        #[test]
        fn rounding_up_never_below_rounding_down(total in 0u32..10_000, pct in 0u32..=100) {
            let q = Quantity::Percent(pct);
            let up = q.resolve(total, Rounding::Up);
            let down = q.resolve(total, Rounding::Down);
            prop_assert!(up >= down);
            prop_assert!(up - down <= 1);
            prop_assert!(up <= total);
        }

        #[test]
        fn nonzero_percent_rounds_up_to_at_least_one(total in 1u32..10_000, pct in 1u32..=100) {
            prop_assert!(Quantity::Percent(pct).resolve(total, Rounding::Up) >= 1);
        }
    }
}
