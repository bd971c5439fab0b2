//! Suite registry: every test case the runner can collect.

use harness::runner::TestCase;

use crate::suites;

pub fn all() -> Vec<TestCase> {
    let mut cases = Vec::new();
    cases.extend(suites::virt::cases());
    cases.extend(suites::storage::cases());
    cases.extend(suites::network::cases());
    // The deprecation audits are always registered; selection decides
    // whether they run.
    cases.extend(suites::deprecated_api::cases());
    cases.extend(suites::upgrade::cases());
    cases.extend(suites::single_node::cases());
    cases
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use harness::item::Marker;
    use std::collections::HashSet;

    #[test]
    fn test_registered_names_are_unique() {
        let cases = all();
        let names: HashSet<String> = cases
            .iter()
            .map(|case| case.item.full_name())
            .collect();
        assert_eq!(names.len(), cases.len());
    }

    #[test]
    fn test_all_paths_live_under_tests() {
        for case in all() {
            assert!(
                case.item.path().starts_with("tests/"),
                "{} lives outside tests/",
                case.item.path()
            );
        }
    }

    #[test]
    fn test_upgrade_process_variants_registered() {
        let cases = all();
        let names: Vec<String> = cases.iter().map(|case| case.item.name().to_string()).collect();
        assert!(names
            .iter()
            .any(|name| name == "test_cnv_upgrade_process_production_source"));
        assert!(names
            .iter()
            .any(|name| name == "test_cnv_upgrade_process_osbs_source"));
    }

    #[test]
    fn test_upgrade_cases_carry_lane_markers() {
        for case in all() {
            let item = &case.item;
            if item.name().contains("upgrade_process") {
                assert!(
                    item.has_marker(&Marker::Upgrade),
                    "{} is missing the upgrade marker",
                    item.name()
                );
            }
        }
    }

    #[test]
    fn test_deprecation_audit_is_marked() {
        let cases = all();
        let audit = cases
            .iter()
            .find(|case| case.item.name() == "test_deprecation_audit_logs")
            .expect("deprecation audit must be registered");
        assert!(audit.item.has_marker(&Marker::DeprecatedApi));
    }

    #[test]
    fn test_single_node_case_is_marked() {
        let cases = all();
        let sno = cases
            .iter()
            .find(|case| case.item.name() == "test_single_node_topology")
            .expect("single-node case must be registered");
        assert!(sno.item.has_marker(&Marker::SingleNodeTests));
    }
}
