//! Collaborators that decorate already-materialized test cases

use crate::steps::Step;
use crate::store::models::ExternalRef;
use anyhow::Result;
use async_trait::async_trait;

/// An issue to open for a test case
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDraft {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// External issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create an issue in `repository` (`owner/repo`) and return its reference
    async fn create_issue(&self, repository: &str, draft: &IssueDraft) -> Result<ExternalRef>;
}

/// Rewrites test steps given the requirement text of a scope.
#[async_trait]
pub trait TextEnhancer: Send + Sync {
    /// Return improved steps. The result must not be empty.
    async fn enhance_steps(&self, requirements: &str, title: &str, steps: &[Step]) -> Result<Vec<Step>>;
}
