//! Azure DevOps REST client for test plans and work items

use super::error::RemoteError;
use super::models::{fields, ListResponse, TestPlan, TestSuite, WorkItem};
use super::retry::{with_retry, RetryPolicy};
use super::traits::{RemoteConnector, TestManagementApi};
use crate::store::models::ConnectionConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const API_VERSION: &str = "7.1";
pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";

/// Client bound to one organization/project
pub struct AdoClient {
    http: Client,
    project_url: String,
    pat: String,
    retry: RetryPolicy,
}

impl AdoClient {
    /// Create a client for `{base_url}/{organization}/{project}`
    pub fn new(
        base_url: &str,
        organization: &str,
        project: &str,
        pat: &str,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create Azure DevOps HTTP client")?;

        Ok(Self {
            http,
            project_url: format!(
                "{}/{}/{}",
                base_url.trim_end_matches('/'),
                urlencoding::encode(organization),
                urlencoding::encode(project)
            ),
            pat: pat.to_string(),
            retry,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/_apis/{}", self.project_url, path)
    }

    /// Send a request built by `build`, retrying transient failures, and
    /// decode the JSON body.
    async fn send<T, F>(&self, resource: &str, build: F) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        with_retry(&self.retry, resource, || {
            let request = build()
                .basic_auth("", Some(&self.pat))
                .query(&[("api-version", API_VERSION)]);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(RemoteError::from_status(status, resource, &body));
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| RemoteError::Decode(format!("{}: {}", resource, e)))
            }
        })
        .await
    }

    // ========================================================================
    // Plans
    // ========================================================================

    pub async fn list_plans(&self) -> Result<Vec<TestPlan>, RemoteError> {
        let url = self.api_url("testplan/plans");
        let list: ListResponse<TestPlan> = self.send("plan list", || self.http.get(&url)).await?;
        Ok(list.value)
    }

    pub async fn get_plan(&self, plan_id: u32) -> Result<TestPlan, RemoteError> {
        let url = self.api_url(&format!("testplan/plans/{}", plan_id));
        self.send(&format!("plan {}", plan_id), || self.http.get(&url))
            .await
    }

    // ========================================================================
    // Suites
    // ========================================================================

    pub async fn list_suites(
        &self,
        plan_id: u32,
        expand_children: bool,
    ) -> Result<Vec<TestSuite>, RemoteError> {
        let url = self.api_url(&format!("testplan/Plans/{}/suites", plan_id));
        let list: ListResponse<TestSuite> = self
            .send(&format!("suites of plan {}", plan_id), || {
                with_expand(self.http.get(&url), expand_children)
            })
            .await?;
        Ok(list.value)
    }

    pub async fn get_suite(
        &self,
        plan_id: u32,
        suite_id: u32,
        expand_children: bool,
    ) -> Result<TestSuite, RemoteError> {
        let url = self.api_url(&format!("testplan/Plans/{}/Suites/{}", plan_id, suite_id));
        self.send(&format!("suite {} of plan {}", suite_id, plan_id), || {
            with_expand(self.http.get(&url), expand_children)
        })
        .await
    }

    pub async fn list_test_case_references(
        &self,
        plan_id: u32,
        suite_id: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        let url = self.api_url(&format!(
            "testplan/Plans/{}/Suites/{}/TestCase",
            plan_id, suite_id
        ));
        let list: ListResponse<Value> = self
            .send(&format!("test cases of suite {}", suite_id), || {
                self.http.get(&url)
            })
            .await?;
        Ok(list.value)
    }

    // ========================================================================
    // Work items
    // ========================================================================

    pub async fn get_work_item(&self, id: u32, field_names: &[&str]) -> Result<WorkItem, RemoteError> {
        let url = self.api_url(&format!("wit/workitems/{}", id));
        let field_list = field_names.join(",");
        self.send(&format!("work item {}", id), || {
            let request = self.http.get(&url);
            if field_list.is_empty() {
                request
            } else {
                request.query(&[("fields", field_list.as_str())])
            }
        })
        .await
    }

    pub async fn update_test_case_steps(
        &self,
        id: u32,
        steps_markup: &str,
    ) -> Result<WorkItem, RemoteError> {
        let url = self.api_url(&format!("wit/workitems/{}", id));
        let patch = json!([{
            "op": "add",
            "path": format!("/fields/{}", fields::STEPS),
            "value": steps_markup,
        }]);
        self.send(&format!("work item {}", id), || {
            self.http
                .patch(&url)
                .header("Content-Type", "application/json-patch+json")
                .body(patch.to_string())
        })
        .await
    }
}

fn with_expand(request: RequestBuilder, expand_children: bool) -> RequestBuilder {
    if expand_children {
        request.query(&[("expand", "children")])
    } else {
        request
    }
}

#[async_trait]
impl TestManagementApi for AdoClient {
    async fn list_plans(&self) -> Result<Vec<TestPlan>, RemoteError> {
        self.list_plans().await
    }

    async fn get_plan(&self, plan_id: u32) -> Result<TestPlan, RemoteError> {
        self.get_plan(plan_id).await
    }

    async fn list_suites(
        &self,
        plan_id: u32,
        expand_children: bool,
    ) -> Result<Vec<TestSuite>, RemoteError> {
        self.list_suites(plan_id, expand_children).await
    }

    async fn get_suite(
        &self,
        plan_id: u32,
        suite_id: u32,
        expand_children: bool,
    ) -> Result<TestSuite, RemoteError> {
        self.get_suite(plan_id, suite_id, expand_children).await
    }

    async fn list_test_case_references(
        &self,
        plan_id: u32,
        suite_id: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        self.list_test_case_references(plan_id, suite_id).await
    }

    async fn get_work_item(&self, id: u32, fields: &[&str]) -> Result<WorkItem, RemoteError> {
        self.get_work_item(id, fields).await
    }

    async fn update_test_case_steps(
        &self,
        id: u32,
        steps_markup: &str,
    ) -> Result<WorkItem, RemoteError> {
        self.update_test_case_steps(id, steps_markup).await
    }
}

/// Connector that builds an [`AdoClient`] per sync run from the scope's connection.
pub struct AdoConnector {
    base_url: String,
    pat: String,
    retry: RetryPolicy,
}

impl AdoConnector {
    pub fn new(base_url: impl Into<String>, pat: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            base_url: base_url.into(),
            pat: pat.into(),
            retry,
        }
    }
}

impl RemoteConnector for AdoConnector {
    fn connect(&self, connection: &ConnectionConfig) -> Result<Arc<dyn TestManagementApi>> {
        let client = AdoClient::new(
            &self.base_url,
            &connection.organization,
            &connection.project,
            &self.pat,
            self.retry.clone(),
        )?;
        Ok(Arc::new(client))
    }
}
