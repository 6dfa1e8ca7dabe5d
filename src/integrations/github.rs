//! GitHub issues client

use super::traits::{IssueDraft, IssueTracker};
use crate::store::models::ExternalRef;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Clone)]
pub struct GitHubIssues {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    body: &'a str,
    labels: &'a [String],
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    html_url: String,
}

impl GitHubIssues {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("testplan-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create GitHub HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl IssueTracker for GitHubIssues {
    async fn create_issue(&self, repository: &str, draft: &IssueDraft) -> Result<ExternalRef> {
        let Some((owner, repo)) = repository.split_once('/') else {
            bail!("Issue repository '{}' is not in owner/repo form", repository);
        };
        let url = format!(
            "{}/repos/{}/{}/issues",
            self.api_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&CreateIssueRequest {
                title: &draft.title,
                body: &draft.body,
                labels: &draft.labels,
            })
            .send()
            .await
            .with_context(|| format!("Failed to reach GitHub at {}", self.api_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub returned {} creating issue in {}: {}", status.as_u16(), repository, body);
        }

        let issue: IssueResponse = response
            .json()
            .await
            .context("Failed to parse GitHub issue response")?;

        tracing::info!("Created issue #{} in {}", issue.number, repository);
        Ok(ExternalRef {
            id: issue.number.to_string(),
            url: issue.html_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn draft() -> IssueDraft {
        IssueDraft {
            title: "Test case 42: Valid login".into(),
            body: "Step 1: Open - Expected: Opened".into(),
            labels: vec!["test-case".into()],
        }
    }

    #[tokio::test]
    async fn test_create_issue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/contoso/web/issues"))
            .and(header("authorization", "Bearer gh-token"))
            .and(body_json(serde_json::json!({
                "title": "Test case 42: Valid login",
                "body": "Step 1: Open - Expected: Opened",
                "labels": ["test-case"]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 17,
                "html_url": "https://github.com/contoso/web/issues/17"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GitHubIssues::new(&server.uri(), "gh-token").unwrap();
        let reference = client.create_issue("contoso/web", &draft()).await.unwrap();
        assert_eq!(reference.id, "17");
        assert_eq!(reference.url, "https://github.com/contoso/web/issues/17");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(410).set_body_string("Issues are disabled"))
            .mount(&server)
            .await;

        let client = GitHubIssues::new(&server.uri(), "gh-token").unwrap();
        let err = client.create_issue("contoso/web", &draft()).await.unwrap_err();
        assert!(err.to_string().contains("410"));
    }

    #[tokio::test]
    async fn test_repository_must_have_owner() {
        let client = GitHubIssues::new(DEFAULT_API_URL, "t").unwrap();
        assert!(client.create_issue("just-a-name", &draft()).await.is_err());
    }
}
