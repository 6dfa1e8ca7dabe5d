//! Test Plan Sync
//!
//! Mirrors remote test plans into a cached document store:
//! - Azure DevOps client for plans, suites and test case work items
//! - Suite tree walking and concurrent test case materialization
//! - Meilisearch-backed snapshot store with staleness detection
//! - Issue tracker and text enhancer integrations
//! - HTTP API and CLI

pub mod ado;
pub mod api;
pub mod integrations;
pub mod steps;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub store: StoreYamlConfig,
    pub meilisearch: MeilisearchYamlConfig,
    pub azure_devops: AzureDevOpsYamlConfig,
    pub github: GitHubYamlConfig,
    pub sync: SyncYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Which snapshot store backs the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Meilisearch,
    /// Process-local store, lost on restart
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "meilisearch" => Ok(Self::Meilisearch),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown store backend '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StoreYamlConfig {
    pub backend: StoreBackend,
}

/// Meilisearch configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MeilisearchYamlConfig {
    pub url: String,
    pub key: String,
}

impl Default for MeilisearchYamlConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:7700".into(),
            key: "testplan-meili-key-change-me".into(),
        }
    }
}

/// Azure DevOps section. Organization and project live in each scope's
/// connection document, not here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AzureDevOpsYamlConfig {
    pub base_url: String,
    pub pat: String,
}

impl Default for AzureDevOpsYamlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dev.azure.com".into(),
            pat: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubYamlConfig {
    pub api_url: String,
    /// Issue linking is disabled without a token
    pub token: Option<String>,
}

impl Default for GitHubYamlConfig {
    fn default() -> Self {
        Self {
            api_url: integrations::github::DEFAULT_API_URL.into(),
            token: None,
        }
    }
}

/// Refresh tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncYamlConfig {
    pub refresh_timeout_secs: u64,
    pub max_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for SyncYamlConfig {
    fn default() -> Self {
        Self {
            refresh_timeout_secs: 300,
            max_concurrency: 8,
            retry_max_attempts: 3,
            retry_initial_backoff_ms: 250,
            retry_max_backoff_ms: 4000,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub store_backend: StoreBackend,
    pub meilisearch_url: String,
    pub meilisearch_key: String,
    pub azure_devops_base_url: String,
    pub azure_devops_pat: String,
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub sync: SyncYamlConfig,
}

impl Config {
    /// Load configuration from `config.yaml` (if present) and the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let store_backend = match std::env::var("STORE_BACKEND") {
            Ok(value) => value.parse().context("Invalid STORE_BACKEND")?,
            Err(_) => yaml.store.backend,
        };

        let mut sync = yaml.sync;
        if let Some(secs) = env_parse("SYNC_REFRESH_TIMEOUT_SECS") {
            sync.refresh_timeout_secs = secs;
        }
        if let Some(width) = env_parse("SYNC_MAX_CONCURRENCY") {
            sync.max_concurrency = width;
        }

        Ok(Self {
            server_port: env_parse("SERVER_PORT").unwrap_or(yaml.server.port),
            store_backend,
            meilisearch_url: std::env::var("MEILISEARCH_URL").unwrap_or(yaml.meilisearch.url),
            meilisearch_key: std::env::var("MEILISEARCH_KEY").unwrap_or(yaml.meilisearch.key),
            azure_devops_base_url: std::env::var("AZURE_DEVOPS_BASE_URL")
                .unwrap_or(yaml.azure_devops.base_url),
            azure_devops_pat: std::env::var("AZURE_DEVOPS_PAT").unwrap_or(yaml.azure_devops.pat),
            github_api_url: std::env::var("GITHUB_API_URL").unwrap_or(yaml.github.api_url),
            github_token: std::env::var("GITHUB_TOKEN")
                .ok()
                .or(yaml.github.token)
                .filter(|t| !t.trim().is_empty()),
            sync,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    pub fn sync_options(&self) -> sync::SyncOptions {
        sync::SyncOptions {
            refresh_timeout: Duration::from_secs(self.sync.refresh_timeout_secs),
            max_concurrency: self.sync.max_concurrency.max(1),
        }
    }

    pub fn retry_policy(&self) -> ado::RetryPolicy {
        ado::RetryPolicy {
            max_attempts: self.sync.retry_max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.sync.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.sync.retry_max_backoff_ms),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<sync::SyncOrchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state with all services initialized
    pub async fn new(config: Config) -> Result<Self> {
        let store: Arc<dyn store::SnapshotStore> = match config.store_backend {
            StoreBackend::Meilisearch => Arc::new(
                store::MeiliSnapshotStore::new(&config.meilisearch_url, &config.meilisearch_key)
                    .await?,
            ),
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory snapshot store; snapshots are lost on restart");
                Arc::new(store::InMemorySnapshotStore::new())
            }
        };

        if config.azure_devops_pat.is_empty() {
            tracing::warn!("AZURE_DEVOPS_PAT is not set; remote calls will be rejected");
        }
        let connector = Arc::new(ado::AdoConnector::new(
            config.azure_devops_base_url.clone(),
            config.azure_devops_pat.clone(),
            config.retry_policy(),
        ));

        let mut orchestrator = sync::SyncOrchestrator::new(store, connector, config.sync_options());
        if let Some(token) = &config.github_token {
            orchestrator = orchestrator.with_issue_tracker(Arc::new(
                integrations::GitHubIssues::new(&config.github_api_url, token)?,
            ));
        } else {
            tracing::info!("GITHUB_TOKEN not set, issue linking disabled");
        }
        if let Some(enhancer) = integrations::ChatCompletionEnhancer::from_env() {
            orchestrator = orchestrator.with_enhancer(Arc::new(enhancer));
        }

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
        })
    }
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;

    let server_state = Arc::new(api::handlers::ServerState {
        orchestrator: state.orchestrator.clone(),
    });
    let app = api::create_router(server_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
