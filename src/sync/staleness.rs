//! Content-based staleness of cached snapshots.
//!
//! A cached scope is stale when it holds no genuine test case: every entry
//! is either marked with an error or reads like a placeholder left behind by
//! an earlier failed fetch. One genuine entry is enough to keep the cache.

use crate::store::models::{PersistedTestCase, SuiteSnapshot};

/// Lower-case fragments that identify placeholder text.
pub const DIAGNOSTIC_PATTERNS: &[&str] = &[
    "could not be processed",
    "fallback",
    "please check configuration",
    "error occurred while fetching",
];

fn matches_diagnostic(text: &str) -> bool {
    let text = text.to_lowercase();
    DIAGNOSTIC_PATTERNS.iter().any(|p| text.contains(p))
}

/// True when the entry stands in for a failed fetch rather than real data.
pub fn is_diagnostic(test_case: &PersistedTestCase) -> bool {
    test_case.error.is_some()
        || matches_diagnostic(&test_case.name)
        || test_case.steps.iter().any(|s| matches_diagnostic(s))
}

/// Staleness verdict for all cached snapshots of a scope.
///
/// Zero suites is stale; so are suites that hold no test case at all.
pub fn is_stale(snapshots: &[SuiteSnapshot]) -> bool {
    !snapshots
        .iter()
        .flat_map(|s| s.test_cases.iter())
        .any(|tc| !is_diagnostic(tc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::models::TestCaseDetail;
    use crate::test_helpers::{persisted_case, test_snapshot};

    #[test]
    fn test_no_suites_is_stale() {
        assert!(is_stale(&[]));
    }

    #[test]
    fn test_suites_without_test_cases_are_stale() {
        assert!(is_stale(&[test_snapshot("s", "1-2", vec![])]));
    }

    #[test]
    fn test_all_fallback_names_are_stale() {
        let cases = (1..=5)
            .map(|i| persisted_case(i, &format!("Fallback test case {}", i)))
            .collect();
        assert!(is_stale(&[test_snapshot("s", "1-2", cases)]));
    }

    #[test]
    fn test_one_real_case_among_nine_diagnostic_is_fresh() {
        let mut cases: Vec<_> = (1..=9)
            .map(|i| persisted_case(i, &format!("Fallback test case {}", i)))
            .collect();
        cases.push(persisted_case(10, "Valid login"));
        assert!(!is_stale(&[test_snapshot("s", "1-2", cases)]));
    }

    #[test]
    fn test_real_case_in_another_suite_keeps_scope_fresh() {
        let broken = test_snapshot(
            "s",
            "1-2",
            vec![TestCaseDetail::diagnostic(3, "timeout").to_persisted()],
        );
        let good = test_snapshot("s", "1-3", vec![persisted_case(4, "Checkout")]);
        assert!(is_stale(&[broken.clone()]));
        assert!(!is_stale(&[broken, good]));
    }

    #[test]
    fn test_error_marker_wins_over_text() {
        let mut case = persisted_case(1, "Looks perfectly normal");
        assert!(!is_diagnostic(&case));
        case.error = Some("decode failed".into());
        assert!(is_diagnostic(&case));
    }

    #[test]
    fn test_step_text_is_matched_case_insensitively() {
        let mut case = persisted_case(1, "Login");
        case.steps = vec!["Step 1: PLEASE CHECK CONFIGURATION - Expected: x".into()];
        assert!(is_diagnostic(&case));
    }

    #[test]
    fn test_no_steps_placeholder_is_genuine() {
        let item = crate::test_helpers::test_work_item(5, "Draft", None);
        let case = TestCaseDetail::from_work_item(&item).to_persisted();
        assert!(!is_diagnostic(&case));
    }
}
