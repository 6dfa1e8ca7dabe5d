//! Test helper factories and mock state builders
//!
//! Provides convenience functions for creating remote and stored objects with
//! sensible defaults, and a builder for mock server state.
#![allow(dead_code)]

use crate::ado::mock::{MockConnector, MockTestManagement};
use crate::ado::models::{fields, EntityRef, TestPlan, TestSuite, WorkItem, TEST_CASE_TYPE};
use crate::api::handlers::{OrchestratorState, ServerState};
use crate::integrations::mock::MockIssueTracker;
use crate::store::models::{ConnectionConfig, PersistedTestCase, SuiteSnapshot};
use crate::store::{InMemorySnapshotStore, SnapshotStore};
use crate::sync::models::TestCaseDetail;
use crate::sync::{SyncOptions, SyncOrchestrator};
use serde_json::{json, Map};
use std::sync::Arc;

// ============================================================================
// Mock state builders
// ============================================================================

/// Server state over an in-memory store seeded with the `team-a` connection
/// and a recording issue tracker.
pub async fn mock_server_state(
    api: MockTestManagement,
) -> (OrchestratorState, Arc<InMemorySnapshotStore>) {
    let store = Arc::new(InMemorySnapshotStore::new());
    store
        .upsert_connection(&test_connection("team-a"))
        .await
        .expect("seed connection");

    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        Arc::new(MockConnector::new(Arc::new(api))),
        SyncOptions::default(),
    )
    .with_issue_tracker(Arc::new(MockIssueTracker::new()));

    let state = Arc::new(ServerState {
        orchestrator: Arc::new(orchestrator),
    });
    (state, store)
}

// ============================================================================
// Remote entities
// ============================================================================

pub fn test_plan(id: u32, name: &str) -> TestPlan {
    TestPlan {
        id,
        name: name.to_string(),
        state: Some("Active".to_string()),
        ..Default::default()
    }
}

/// Suite with an optional parent; children are left empty
pub fn test_suite(id: u32, name: &str, parent: Option<u32>) -> TestSuite {
    TestSuite {
        id,
        name: name.to_string(),
        parent_suite: parent.map(|id| EntityRef { id, name: None }),
        ..Default::default()
    }
}

/// Test case work item, with raw step markup when given
pub fn test_work_item(id: u32, title: &str, steps_markup: Option<&str>) -> WorkItem {
    let mut fields_map = Map::new();
    fields_map.insert(fields::WORK_ITEM_TYPE.to_string(), json!(TEST_CASE_TYPE));
    fields_map.insert(fields::TITLE.to_string(), json!(title));
    if let Some(markup) = steps_markup {
        fields_map.insert(fields::STEPS.to_string(), json!(markup));
    }
    WorkItem {
        id,
        fields: fields_map,
        steps: None,
    }
}

// ============================================================================
// Stored documents
// ============================================================================

/// A genuine test case with two steps
pub fn persisted_case(id: u32, name: &str) -> PersistedTestCase {
    PersistedTestCase {
        id,
        name: name.to_string(),
        steps: vec![
            "Step 1: Open the application - Expected: Home page is shown".to_string(),
            format!("Step 2: Run '{}' - Expected: Scenario passes", name),
        ],
        status: Some("Ready".to_string()),
        external_ref: None,
        error: None,
    }
}

/// The placeholder written when a test case could not be fetched
pub fn diagnostic_case(id: u32) -> PersistedTestCase {
    TestCaseDetail::diagnostic(id, format!("work item {} not found", id)).to_persisted()
}

pub fn test_snapshot(scope: &str, key: &str, cases: Vec<PersistedTestCase>) -> SuiteSnapshot {
    SuiteSnapshot {
        resource_scope: scope.to_string(),
        name: format!("Suite {}", key),
        key: key.to_string(),
        test_cases: cases,
    }
}

pub fn test_connection(scope: &str) -> ConnectionConfig {
    ConnectionConfig {
        resource_scope: scope.to_string(),
        organization: "contoso".to_string(),
        project: "Web Shop".to_string(),
        issue_repository: Some("contoso/web".to_string()),
        requirements: "Users can sign in with email and password.".to_string(),
        plan_ids: vec![],
    }
}
