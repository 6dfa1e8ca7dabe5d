//! Trait abstraction for the remote test-management system

use super::error::RemoteError;
use super::models::{TestPlan, TestSuite, WorkItem};
use crate::store::models::ConnectionConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Operations the sync pipeline consumes from the remote system.
///
/// Implementations retry transient failures per call; callers never retry.
#[async_trait]
pub trait TestManagementApi: Send + Sync {
    /// List every test plan in the project
    async fn list_plans(&self) -> Result<Vec<TestPlan>, RemoteError>;

    /// Get a plan by id
    async fn get_plan(&self, plan_id: u32) -> Result<TestPlan, RemoteError>;

    /// Flat list of all suites in a plan
    async fn list_suites(
        &self,
        plan_id: u32,
        expand_children: bool,
    ) -> Result<Vec<TestSuite>, RemoteError>;

    /// Get one suite, optionally with its direct children inlined
    async fn get_suite(
        &self,
        plan_id: u32,
        suite_id: u32,
        expand_children: bool,
    ) -> Result<TestSuite, RemoteError>;

    /// Raw test case references of a suite, in listing order.
    ///
    /// Records are returned untyped because the id lives in one of several
    /// shapes (see `sync::identifier`).
    async fn list_test_case_references(
        &self,
        plan_id: u32,
        suite_id: u32,
    ) -> Result<Vec<Value>, RemoteError>;

    /// Get a work item restricted to the given fields
    async fn get_work_item(&self, id: u32, fields: &[&str]) -> Result<WorkItem, RemoteError>;

    /// Replace the steps markup of a test case
    async fn update_test_case_steps(
        &self,
        id: u32,
        steps_markup: &str,
    ) -> Result<WorkItem, RemoteError>;
}

/// Builds a fresh remote client for one synchronization run.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, connection: &ConnectionConfig) -> anyhow::Result<Arc<dyn TestManagementApi>>;
}
