//! Materialization of one suite's test cases.

use super::identifier::resolve_test_case_id;
use super::models::TestCaseDetail;
use crate::ado::models::{fields, TestSuite, TEST_CASE_TYPE};
use crate::ado::{RemoteError, TestManagementApi};
use crate::store::models::{suite_key, SuiteSnapshot};
use futures::stream::{self, StreamExt};

/// Test cases of one suite, in listing order.
#[derive(Debug, Clone)]
pub struct MaterializedSuite {
    pub plan_id: u32,
    pub suite_id: u32,
    pub name: String,
    pub test_cases: Vec<TestCaseDetail>,
    /// References whose test case id could not be resolved
    pub dropped_references: usize,
}

impl MaterializedSuite {
    pub fn key(&self) -> String {
        suite_key(self.plan_id, self.suite_id)
    }

    pub fn failed_test_cases(&self) -> usize {
        self.test_cases.iter().filter(|tc| tc.is_diagnostic()).count()
    }

    pub fn to_snapshot(&self, resource_scope: &str) -> SuiteSnapshot {
        SuiteSnapshot {
            resource_scope: resource_scope.to_string(),
            name: self.name.clone(),
            key: self.key(),
            test_cases: self.test_cases.iter().map(TestCaseDetail::to_persisted).collect(),
        }
    }
}

/// Fetch one test case: a type probe, then the full field set.
pub async fn fetch_test_case(api: &dyn TestManagementApi, id: u32) -> Result<TestCaseDetail, RemoteError> {
    let probe = api.get_work_item(id, &[fields::WORK_ITEM_TYPE]).await?;
    match probe.work_item_type() {
        Some(kind) if kind == TEST_CASE_TYPE => {}
        other => {
            return Err(RemoteError::TypeMismatch {
                id,
                actual: other.unwrap_or_else(|| "unknown".to_string()),
            })
        }
    }

    let item = api.get_work_item(id, fields::DETAIL).await?;
    Ok(TestCaseDetail::from_work_item(&item))
}

/// Materialize every test case referenced by `suite`.
///
/// Detail fetches run `width` at a time and their results keep listing order.
/// A failed fetch becomes a diagnostic entry; only a failed listing fails the
/// suite.
pub async fn materialize_suite(
    api: &dyn TestManagementApi,
    plan_id: u32,
    suite: &TestSuite,
    width: usize,
) -> Result<MaterializedSuite, RemoteError> {
    let references = api.list_test_case_references(plan_id, suite.id).await?;

    let mut ids = Vec::with_capacity(references.len());
    let mut dropped = 0;
    for (position, reference) in references.iter().enumerate() {
        match resolve_test_case_id(reference) {
            Some(id) => ids.push(id),
            None => {
                dropped += 1;
                tracing::warn!(
                    "Suite {}-{}: dropping reference #{} with no resolvable test case id",
                    plan_id,
                    suite.id,
                    position + 1
                );
            }
        }
    }

    let test_cases: Vec<TestCaseDetail> = stream::iter(ids)
        .map(|id| async move {
            match fetch_test_case(api, id).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(
                        "Suite {}-{}: test case {} failed: {}",
                        plan_id,
                        suite.id,
                        id,
                        e
                    );
                    TestCaseDetail::diagnostic(id, &e)
                }
            }
        })
        .buffered(width.max(1))
        .collect()
        .await;

    tracing::debug!(
        "Suite {}-{}: materialized {} test cases ({} dropped references)",
        plan_id,
        suite.id,
        test_cases.len(),
        dropped
    );

    Ok(MaterializedSuite {
        plan_id,
        suite_id: suite.id,
        name: suite.name.clone(),
        test_cases,
        dropped_references: dropped,
    })
}
