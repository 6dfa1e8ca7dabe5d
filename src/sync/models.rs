//! Canonical test case model and sync results

use crate::ado::models::{fields, WorkItem};
use crate::steps::{decode_markup, render_persisted, Step};
use crate::store::models::{PersistedTestCase, SuiteSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Step synthesized for a test case that has no steps at all.
pub const NO_STEPS_ACTION: &str = "No steps defined for this test case";
pub const NO_STEPS_EXPECTED: &str = "Add steps to this test case";

/// Fully materialized test case, before it is flattened into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseDetail {
    pub id: u32,
    pub title: String,
    pub state: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: Option<i64>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    pub steps: Vec<Step>,
    /// Set when this entry stands in for a failed fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseDetail {
    /// Build from a full work item fetch.
    ///
    /// Structured steps win over the markup field; when neither yields a
    /// step, a single "no steps defined" step is synthesized.
    pub fn from_work_item(item: &WorkItem) -> Self {
        let mut steps = match &item.steps {
            Some(steps) if !steps.is_empty() => steps.clone(),
            _ => item
                .field_str(fields::STEPS)
                .map(|markup| decode_markup(&markup))
                .unwrap_or_default(),
        };
        if steps.is_empty() {
            steps.push(Step::new(NO_STEPS_ACTION.into(), NO_STEPS_EXPECTED.into()));
        }

        Self {
            id: item.id,
            title: item
                .field_str(fields::TITLE)
                .unwrap_or_else(|| format!("Test case {}", item.id)),
            state: item.field_str(fields::STATE),
            assigned_to: item.field_str(fields::ASSIGNED_TO),
            priority: item.field_i64(fields::PRIORITY),
            area_path: item.field_str(fields::AREA_PATH),
            iteration_path: item.field_str(fields::ITERATION_PATH),
            steps,
            error: None,
        }
    }

    /// Placeholder for a test case whose fetch failed.
    pub fn diagnostic(id: u32, error: impl std::fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            id,
            title: format!("Test case {} could not be processed", id),
            state: None,
            assigned_to: None,
            priority: None,
            area_path: None,
            iteration_path: None,
            steps: vec![Step::new(
                format!("An error occurred while fetching test case {}: {}", id, error),
                "Please check configuration and retry the sync".into(),
            )],
            error: Some(error),
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.error.is_some()
    }

    pub fn to_persisted(&self) -> PersistedTestCase {
        PersistedTestCase {
            id: self.id,
            name: self.title.clone(),
            steps: render_persisted(&self.steps),
            status: self.state.clone(),
            external_ref: None,
            error: self.error.clone(),
        }
    }
}

/// Outcome of one refresh run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: Uuid,
    pub resource_scope: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub plans: usize,
    pub failed_plans: usize,
    pub suites: usize,
    pub failed_suites: usize,
    pub test_cases: usize,
    pub failed_test_cases: usize,
    pub dropped_references: usize,
    /// Snapshots removed because their suite no longer exists remotely
    pub removed_suites: usize,
    /// True when the deadline or a cancellation cut the run short
    pub timed_out: bool,
    #[serde(skip)]
    pub snapshots: Vec<SuiteSnapshot>,
}

/// Where the suites returned by a read came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Cache,
    Refresh,
    /// Refresh failed and the previous (stale) cache was served instead
    StaleCache,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuitesView {
    pub resource_scope: String,
    pub source: ViewSource,
    pub suites: Vec<SuiteSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::DEFAULT_EXPECTED_RESULT;
    use crate::test_helpers::test_work_item;
    use serde_json::json;

    #[test]
    fn test_structured_steps_win_over_markup() {
        let mut item = test_work_item(5, "Login", Some("<steps><step><parameterizedString>Ignored</parameterizedString><parameterizedString>x</parameterizedString></step></steps>"));
        item.steps = Some(vec![Step::new("Open".into(), "Opened".into())]);

        let detail = TestCaseDetail::from_work_item(&item);
        assert_eq!(detail.steps, vec![Step::new("Open".into(), "Opened".into())]);
    }

    #[test]
    fn test_markup_steps_are_decoded() {
        let item = test_work_item(
            5,
            "Login",
            Some("<steps id=\"0\" last=\"1\"><step id=\"1\" type=\"ActionStep\"><parameterizedString isformatted=\"true\">Enter &lt;b&gt;user&lt;/b&gt;</parameterizedString><parameterizedString isformatted=\"true\"></parameterizedString><description/></step></steps>"),
        );

        let detail = TestCaseDetail::from_work_item(&item);
        assert_eq!(detail.title, "Login");
        assert_eq!(detail.steps.len(), 1);
        assert_eq!(detail.steps[0].action, "Enter user");
        assert_eq!(detail.steps[0].expected_result, DEFAULT_EXPECTED_RESULT);
        assert!(!detail.is_diagnostic());
    }

    #[test]
    fn test_missing_steps_synthesize_placeholder() {
        let item = test_work_item(8, "Empty", None);
        let detail = TestCaseDetail::from_work_item(&item);
        assert_eq!(detail.steps.len(), 1);
        assert_eq!(detail.steps[0].action, NO_STEPS_ACTION);
        assert!(detail.error.is_none());
    }

    #[test]
    fn test_cleared_steps_synthesize_placeholder() {
        let item = test_work_item(9, "Cleared", Some(r#"<steps id="0" last="0"/>"#));
        let detail = TestCaseDetail::from_work_item(&item);
        assert_eq!(detail.steps.len(), 1);
        assert_eq!(detail.steps[0].action, NO_STEPS_ACTION);
        assert!(!detail.steps[0].action.contains("<steps"));
    }

    #[test]
    fn test_detail_fields() {
        let mut item = test_work_item(8, "Checkout", None);
        item.fields.insert(fields::STATE.into(), json!("Ready"));
        item.fields.insert(fields::PRIORITY.into(), json!(1));
        item.fields
            .insert(fields::ASSIGNED_TO.into(), json!({"displayName": "Robin"}));

        let detail = TestCaseDetail::from_work_item(&item);
        assert_eq!(detail.state.as_deref(), Some("Ready"));
        assert_eq!(detail.priority, Some(1));
        assert_eq!(detail.assigned_to.as_deref(), Some("Robin"));

        let persisted = detail.to_persisted();
        assert_eq!(persisted.status.as_deref(), Some("Ready"));
        assert_eq!(
            persisted.steps,
            vec![format!("Step 1: {} - Expected: {}", NO_STEPS_ACTION, NO_STEPS_EXPECTED)]
        );
    }

    #[test]
    fn test_diagnostic_entry() {
        let detail = TestCaseDetail::diagnostic(77, "work item 77 not found");
        assert!(detail.is_diagnostic());
        assert_eq!(detail.title, "Test case 77 could not be processed");

        let persisted = detail.to_persisted();
        assert_eq!(persisted.error.as_deref(), Some("work item 77 not found"));
        assert!(persisted.steps[0].contains("An error occurred while fetching test case 77"));
    }
}
