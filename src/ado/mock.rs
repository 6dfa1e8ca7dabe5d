//! In-memory mock implementation of TestManagementApi for testing without a
//! real Azure DevOps organization.

use super::error::RemoteError;
use super::models::{TestPlan, TestSuite, WorkItem};
use super::traits::{RemoteConnector, TestManagementApi};
use crate::store::models::ConnectionConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable remote system.
///
/// Built with the `with_*` methods, then shared behind an `Arc`. Every call
/// is recorded so tests can assert on traffic.
#[derive(Default)]
pub struct MockTestManagement {
    plans: Vec<TestPlan>,
    plan_list_error: Option<RemoteError>,
    plan_delay: Option<Duration>,
    suite_listings: HashMap<u32, Result<Vec<TestSuite>, RemoteError>>,
    expanded_listings: HashMap<u32, Vec<TestSuite>>,
    suites: HashMap<u32, TestSuite>,
    children: HashMap<u32, Vec<u32>>,
    references: HashMap<u32, Result<Vec<Value>, RemoteError>>,
    work_items: HashMap<u32, WorkItem>,
    work_item_errors: HashMap<u32, RemoteError>,
    work_item_delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    patched: Mutex<Vec<(u32, String)>>,
}

impl MockTestManagement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: TestPlan) -> Self {
        self.plans.push(plan);
        self
    }

    pub fn with_plan_list_error(mut self, error: RemoteError) -> Self {
        self.plan_list_error = Some(error);
        self
    }

    /// Result of the flat (non-expanded) suite listing for a plan
    pub fn with_suite_listing(mut self, plan_id: u32, suites: Vec<TestSuite>) -> Self {
        self.suite_listings.insert(plan_id, Ok(suites));
        self
    }

    pub fn with_suite_listing_error(mut self, plan_id: u32, error: RemoteError) -> Self {
        self.suite_listings.insert(plan_id, Err(error));
        self
    }

    /// Result of the expanded suite listing for a plan
    pub fn with_expanded_listing(mut self, plan_id: u32, suites: Vec<TestSuite>) -> Self {
        self.expanded_listings.insert(plan_id, suites);
        self
    }

    /// Register a suite for `get_suite`, with the ids of its direct children
    pub fn with_suite(mut self, suite: TestSuite, children: &[u32]) -> Self {
        self.children.insert(suite.id, children.to_vec());
        self.suites.insert(suite.id, suite);
        self
    }

    pub fn with_references(mut self, suite_id: u32, references: Vec<Value>) -> Self {
        self.references.insert(suite_id, Ok(references));
        self
    }

    pub fn with_reference_error(mut self, suite_id: u32, error: RemoteError) -> Self {
        self.references.insert(suite_id, Err(error));
        self
    }

    pub fn with_work_item(mut self, item: WorkItem) -> Self {
        self.work_items.insert(item.id, item);
        self
    }

    pub fn with_work_item_error(mut self, id: u32, error: RemoteError) -> Self {
        self.work_item_errors.insert(id, error);
        self
    }

    /// Delay every work item fetch (for deadline tests)
    pub fn with_plan_delay(mut self, delay: Duration) -> Self {
        self.plan_delay = Some(delay);
        self
    }

    pub fn with_work_item_delay(mut self, delay: Duration) -> Self {
        self.work_item_delay = Some(delay);
        self
    }

    /// All recorded calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of recorded calls starting with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Steps markup written through `update_test_case_steps`
    pub fn patched(&self) -> Vec<(u32, String)> {
        self.patched.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn suite_with_children(&self, suite_id: u32) -> Option<TestSuite> {
        let mut suite = self.suites.get(&suite_id)?.clone();
        suite.children = self
            .children
            .get(&suite_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.suites.get(id))
                    .map(|child| TestSuite {
                        children: Vec::new(),
                        ..child.clone()
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(suite)
    }
}

#[async_trait]
impl TestManagementApi for MockTestManagement {
    async fn list_plans(&self) -> Result<Vec<TestPlan>, RemoteError> {
        self.record("list_plans".into());
        if let Some(delay) = self.plan_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.plan_list_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.plans.clone()),
        }
    }

    async fn get_plan(&self, plan_id: u32) -> Result<TestPlan, RemoteError> {
        self.record(format!("get_plan:{}", plan_id));
        if let Some(delay) = self.plan_delay {
            tokio::time::sleep(delay).await;
        }
        self.plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                resource: format!("plan {}", plan_id),
            })
    }

    async fn list_suites(
        &self,
        plan_id: u32,
        expand_children: bool,
    ) -> Result<Vec<TestSuite>, RemoteError> {
        self.record(format!("list_suites:{}:{}", plan_id, expand_children));
        if expand_children {
            return Ok(self
                .expanded_listings
                .get(&plan_id)
                .cloned()
                .unwrap_or_default());
        }
        match self.suite_listings.get(&plan_id) {
            Some(result) => result.clone(),
            None => Ok(Vec::new()),
        }
    }

    async fn get_suite(
        &self,
        plan_id: u32,
        suite_id: u32,
        expand_children: bool,
    ) -> Result<TestSuite, RemoteError> {
        self.record(format!("get_suite:{}:{}", plan_id, suite_id));
        let not_found = || RemoteError::NotFound {
            resource: format!("suite {}", suite_id),
        };
        if expand_children {
            self.suite_with_children(suite_id).ok_or_else(not_found)
        } else {
            self.suites.get(&suite_id).cloned().ok_or_else(not_found)
        }
    }

    async fn list_test_case_references(
        &self,
        plan_id: u32,
        suite_id: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        self.record(format!("list_test_cases:{}:{}", plan_id, suite_id));
        match self.references.get(&suite_id) {
            Some(result) => result.clone(),
            None => Ok(Vec::new()),
        }
    }

    async fn get_work_item(&self, id: u32, fields: &[&str]) -> Result<WorkItem, RemoteError> {
        self.record(format!("get_work_item:{}:{}", id, fields.len()));
        if let Some(delay) = self.work_item_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.work_item_errors.get(&id) {
            return Err(err.clone());
        }
        let item = self
            .work_items
            .get(&id)
            .ok_or_else(|| RemoteError::NotFound {
                resource: format!("work item {}", id),
            })?;
        // Only return the requested fields, like the real API
        let mut filtered = item.clone();
        filtered.fields.retain(|name, _| fields.contains(&name.as_str()));
        if fields.len() == 1 {
            filtered.steps = None;
        }
        Ok(filtered)
    }

    async fn update_test_case_steps(
        &self,
        id: u32,
        steps_markup: &str,
    ) -> Result<WorkItem, RemoteError> {
        self.record(format!("update_steps:{}", id));
        if let Some(err) = self.work_item_errors.get(&id) {
            return Err(err.clone());
        }
        if let Ok(mut patched) = self.patched.lock() {
            patched.push((id, steps_markup.to_string()));
        }
        self.work_items
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                resource: format!("work item {}", id),
            })
    }
}

/// Connector that always hands out the same mock
pub struct MockConnector {
    api: Arc<MockTestManagement>,
}

impl MockConnector {
    pub fn new(api: Arc<MockTestManagement>) -> Self {
        Self { api }
    }
}

impl RemoteConnector for MockConnector {
    fn connect(&self, _connection: &ConnectionConfig) -> anyhow::Result<Arc<dyn TestManagementApi>> {
        Ok(self.api.clone())
    }
}
