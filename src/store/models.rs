//! Durable documents: suite snapshots and per-scope connection configs

use serde::{Deserialize, Serialize};

/// Cached representation of one suite and its materialized test cases.
///
/// Identity is `(resource_scope, key)`. Each sync replaces the whole
/// document; nothing is merged across syncs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteSnapshot {
    pub resource_scope: String,
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub test_cases: Vec<PersistedTestCase>,
}

impl SuiteSnapshot {
    /// Find a test case by remote id
    pub fn test_case(&self, id: u32) -> Option<&PersistedTestCase> {
        self.test_cases.iter().find(|tc| tc.id == id)
    }
}

/// A test case as stored inside a [`SuiteSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedTestCase {
    pub id: u32,
    pub name: String,
    /// Steps in the `"Step {n}: {action} - Expected: {expected}"` format
    #[serde(default)]
    pub steps: Vec<String>,
    /// Remote lifecycle state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<ExternalRef>,
    /// Set only on diagnostic placeholders written after a failed fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pointer to an issue created for a test case in an external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRef {
    pub id: String,
    pub url: String,
}

/// Per-scope binding to a remote organization/project and issue repository.
///
/// Created once and read on every sync; never deleted automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub resource_scope: String,
    pub organization: String,
    pub project: String,
    /// `owner/repo` of the issue tracker repository
    #[serde(default)]
    pub issue_repository: Option<String>,
    /// Requirement document text, handed to the text enhancer
    #[serde(default)]
    pub requirements: String,
    /// Restrict syncing to these plans; empty means every plan in the project
    #[serde(default)]
    pub plan_ids: Vec<u32>,
}

/// Snapshot key for a suite within a plan
pub fn suite_key(plan_id: u32, suite_id: u32) -> String {
    format!("{}-{}", plan_id, suite_id)
}
