//! Recording doubles for the issue tracker and text enhancer

use super::traits::{IssueDraft, IssueTracker, TextEnhancer};
use crate::steps::Step;
use crate::store::models::ExternalRef;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct MockIssueTracker {
    created: Mutex<Vec<(String, IssueDraft)>>,
    fail: bool,
}

impl MockIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `(repository, draft)` pairs, in creation order
    pub fn created(&self) -> Vec<(String, IssueDraft)> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl IssueTracker for MockIssueTracker {
    async fn create_issue(&self, repository: &str, draft: &IssueDraft) -> Result<ExternalRef> {
        if self.fail {
            bail!("issue tracker unavailable");
        }
        let mut created = self
            .created
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        created.push((repository.to_string(), draft.clone()));
        let number = created.len();
        Ok(ExternalRef {
            id: number.to_string(),
            url: format!("https://issues.example/{}/{}", repository, number),
        })
    }
}

/// Enhancer that returns a fixed step list
pub struct MockEnhancer {
    steps: Vec<Step>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MockEnhancer {
    pub fn returning(steps: Vec<Step>) -> Self {
        Self {
            steps,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(requirements, title)` pairs seen so far
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextEnhancer for MockEnhancer {
    async fn enhance_steps(&self, requirements: &str, title: &str, _steps: &[Step]) -> Result<Vec<Step>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((requirements.to_string(), title.to_string()));
        }
        Ok(self.steps.clone())
    }
}
