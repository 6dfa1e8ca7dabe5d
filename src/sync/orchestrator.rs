//! Synchronization orchestrator.
//!
//! A refresh fans out one task per plan. Each task walks its plan's suite
//! tree and materializes the suites concurrently, streaming results back
//! over a channel. The collector stops at the deadline or on cancellation
//! and persists whatever suites were fully assembled by then.

use super::error::{SyncError, SyncResult};
use super::materializer::{materialize_suite, MaterializedSuite};
use super::models::{SuitesView, SyncReport, ViewSource};
use super::staleness::{is_diagnostic, is_stale};
use super::walker::walk_plan;
use crate::ado::models::TestPlan;
use crate::ado::{RemoteConnector, RemoteError, TestManagementApi};
use crate::integrations::{IssueDraft, IssueTracker, TextEnhancer};
use crate::steps::{parse_persisted, render_markup, render_persisted};
use crate::store::models::{suite_key, ConnectionConfig, ExternalRef, PersistedTestCase, SuiteSnapshot};
use crate::store::SnapshotStore;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tuning for refresh runs
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Whole-refresh deadline
    pub refresh_timeout: Duration,
    /// Fan-out width for suites within a plan and test cases within a suite
    pub max_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            refresh_timeout: Duration::from_secs(300),
            max_concurrency: 8,
        }
    }
}

/// Progress reported by a plan task
enum PlanEvent {
    WalkFailed {
        plan_id: u32,
    },
    Walked {
        keys: Vec<String>,
    },
    Suite {
        plan_index: usize,
        suite_index: usize,
        suite: MaterializedSuite,
    },
    SuiteFailed {
        key: String,
    },
}

#[derive(Default)]
struct RunState {
    walked_plans: usize,
    failed_plans: usize,
    discovered: HashSet<String>,
    failed_suites: usize,
    suites: Vec<(usize, usize, MaterializedSuite)>,
}

impl RunState {
    fn apply(&mut self, event: PlanEvent) {
        match event {
            PlanEvent::WalkFailed { plan_id } => {
                tracing::debug!("Plan {} contributed no suites", plan_id);
                self.failed_plans += 1;
            }
            PlanEvent::Walked { keys } => {
                self.walked_plans += 1;
                self.discovered.extend(keys);
            }
            PlanEvent::Suite {
                plan_index,
                suite_index,
                suite,
            } => self.suites.push((plan_index, suite_index, suite)),
            PlanEvent::SuiteFailed { key } => {
                tracing::debug!("Suite {} kept its previous snapshot", key);
                self.failed_suites += 1;
            }
        }
    }
}

pub struct SyncOrchestrator {
    store: Arc<dyn SnapshotStore>,
    connector: Arc<dyn RemoteConnector>,
    issue_tracker: Option<Arc<dyn IssueTracker>>,
    enhancer: Option<Arc<dyn TextEnhancer>>,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        connector: Arc<dyn RemoteConnector>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            connector,
            issue_tracker: None,
            enhancer: None,
            options,
        }
    }

    pub fn with_issue_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.issue_tracker = Some(tracker);
        self
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn TextEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Refresh every suite of `scope` from the remote system.
    pub async fn refresh(&self, scope: &str) -> SyncResult<SyncReport> {
        self.refresh_with_cancel(scope, CancellationToken::new()).await
    }

    /// Refresh with a caller-controlled cancellation token.
    ///
    /// Cancelling (or hitting the refresh deadline) abandons outstanding
    /// remote calls; suites already assembled are still persisted.
    pub async fn refresh_with_cancel(
        &self,
        scope: &str,
        cancel: CancellationToken,
    ) -> SyncResult<SyncReport> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let connection = self.get_connection(scope).await?;

        let api = self
            .connector
            .connect(&connection)
            .map_err(|e| SyncError::ClientSetup(format!("{:#}", e)))?;

        // The deadline covers plan loading too
        let deadline = Instant::now() + self.options.refresh_timeout;
        let (plans, missing_plans) = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("Sync {} for scope '{}' cancelled while loading plans", run_id, scope);
                return Err(SyncError::EmptyRefresh(scope.to_string()));
            }
            loaded = tokio::time::timeout_at(deadline, load_plans(api.as_ref(), &connection)) => {
                match loaded {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(
                            "Sync {} for scope '{}' hit the {:?} deadline while loading plans",
                            run_id,
                            scope,
                            self.options.refresh_timeout
                        );
                        return Err(SyncError::EmptyRefresh(scope.to_string()));
                    }
                }
            }
        };
        tracing::info!(
            "Sync {} for scope '{}': {} plans in {}/{}",
            run_id,
            scope,
            plans.len(),
            connection.organization,
            connection.project
        );

        let width = self.options.max_concurrency.max(1);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        for (plan_index, plan) in plans.iter().cloned().enumerate() {
            tasks.spawn(sync_plan(api.clone(), plan_index, plan, width, tx.clone()));
        }
        drop(tx);

        let mut state = RunState::default();
        let mut interrupted = false;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!("Sync {} for scope '{}' cancelled", run_id, scope);
                    interrupted = true;
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        "Sync {} for scope '{}' hit the {:?} deadline",
                        run_id,
                        scope,
                        self.options.refresh_timeout
                    );
                    interrupted = true;
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => state.apply(event),
                    None => break,
                },
            }
        }

        if interrupted {
            tasks.abort_all();
            // Suites finished just before the cut-off are still usable
            while let Ok(event) = rx.try_recv() {
                state.apply(event);
            }
        } else {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Plan task of sync {} failed: {}", run_id, e);
                    state.failed_plans += 1;
                }
            }
        }

        if state.suites.is_empty() {
            tracing::warn!(
                "Sync {} for scope '{}' produced no suites; keeping cached snapshots",
                run_id,
                scope
            );
            return Err(SyncError::EmptyRefresh(scope.to_string()));
        }

        state.suites.sort_by_key(|(plan_index, suite_index, _)| (*plan_index, *suite_index));
        let suites: Vec<MaterializedSuite> = state.suites.into_iter().map(|(_, _, s)| s).collect();
        let snapshots: Vec<SuiteSnapshot> = suites.iter().map(|s| s.to_snapshot(scope)).collect();
        self.store.upsert_snapshots(&snapshots).await?;

        let complete = !interrupted
            && missing_plans == 0
            && state.failed_plans == 0
            && state.walked_plans == plans.len();
        let removed_suites = if complete {
            self.remove_orphans(scope, &state.discovered).await?
        } else {
            0
        };

        let report = SyncReport {
            run_id,
            resource_scope: scope.to_string(),
            started_at,
            finished_at: Utc::now(),
            plans: plans.len() + missing_plans,
            failed_plans: state.failed_plans + missing_plans,
            suites: snapshots.len(),
            failed_suites: state.failed_suites,
            test_cases: suites.iter().map(|s| s.test_cases.len()).sum(),
            failed_test_cases: suites.iter().map(MaterializedSuite::failed_test_cases).sum(),
            dropped_references: suites.iter().map(|s| s.dropped_references).sum(),
            removed_suites,
            timed_out: interrupted,
            snapshots,
        };

        tracing::info!(
            "Sync {} for scope '{}' done: {} suites, {} test cases ({} failed), {} suites failed, {} removed{}",
            run_id,
            scope,
            report.suites,
            report.test_cases,
            report.failed_test_cases,
            report.failed_suites,
            report.removed_suites,
            if report.timed_out { ", cut short" } else { "" }
        );

        Ok(report)
    }

    /// Delete snapshots of suites that no longer exist remotely
    async fn remove_orphans(&self, scope: &str, discovered: &HashSet<String>) -> SyncResult<usize> {
        let mut removed = 0;
        for snapshot in self.store.list_snapshots(scope).await? {
            if !discovered.contains(&snapshot.key) {
                tracing::info!("Removing snapshot of vanished suite {} in scope '{}'", snapshot.key, scope);
                self.store.delete_snapshot(scope, &snapshot.key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Suites of a scope, refreshing first when the cache is stale or empty.
    ///
    /// When that refresh fails but something is cached, the cached suites
    /// are served anyway and the failure is reported in the view.
    pub async fn read_suites(&self, scope: &str, force_refresh: bool) -> SyncResult<SuitesView> {
        let cached = self.store.list_snapshots(scope).await?;

        if !force_refresh {
            if !is_stale(&cached) {
                tracing::debug!("Serving {} cached suites for scope '{}'", cached.len(), scope);
                return Ok(SuitesView {
                    resource_scope: scope.to_string(),
                    source: ViewSource::Cache,
                    suites: cached,
                    refresh_error: None,
                    report: None,
                });
            }
            tracing::info!(
                "Cache for scope '{}' is stale ({} suites), refreshing",
                scope,
                cached.len()
            );
        }

        match self.refresh(scope).await {
            Ok(report) => Ok(SuitesView {
                resource_scope: scope.to_string(),
                source: ViewSource::Refresh,
                suites: self.store.list_snapshots(scope).await?,
                refresh_error: None,
                report: Some(report),
            }),
            Err(e) if !cached.is_empty() => {
                tracing::warn!("Refresh of scope '{}' failed, serving cached suites: {}", scope, e);
                Ok(SuitesView {
                    resource_scope: scope.to_string(),
                    source: ViewSource::StaleCache,
                    suites: cached,
                    refresh_error: Some(e.to_string()),
                    report: None,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_snapshot(&self, scope: &str, key: &str) -> SyncResult<SuiteSnapshot> {
        self.store
            .get_snapshot(scope, key)
            .await?
            .ok_or_else(|| SyncError::SnapshotNotFound {
                scope: scope.to_string(),
                key: key.to_string(),
            })
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub async fn get_connection(&self, scope: &str) -> SyncResult<ConnectionConfig> {
        self.store
            .get_connection(scope)
            .await?
            .ok_or_else(|| SyncError::ConnectionNotFound(scope.to_string()))
    }

    pub async fn save_connection(&self, connection: &ConnectionConfig) -> SyncResult<()> {
        for (field, value) in [
            ("resourceScope", &connection.resource_scope),
            ("organization", &connection.organization),
            ("project", &connection.project),
        ] {
            if value.trim().is_empty() {
                return Err(SyncError::InvalidInput(format!("{} must not be empty", field)));
            }
        }
        if let Some(repo) = &connection.issue_repository {
            if repo.split_once('/').map_or(true, |(o, r)| o.is_empty() || r.is_empty()) {
                return Err(SyncError::InvalidInput(format!(
                    "issueRepository '{}' must be owner/repo",
                    repo
                )));
            }
        }
        self.store.upsert_connection(connection).await?;
        tracing::info!("Saved connection for scope '{}'", connection.resource_scope);
        Ok(())
    }

    pub async fn list_connections(&self) -> SyncResult<Vec<ConnectionConfig>> {
        Ok(self.store.list_connections().await?)
    }

    // ========================================================================
    // Test case decoration
    // ========================================================================

    /// Open an issue for a materialized test case and record its reference.
    ///
    /// A test case that already carries a reference is returned unchanged.
    pub async fn link_issue(&self, scope: &str, key: &str, test_case_id: u32) -> SyncResult<ExternalRef> {
        let tracker = self
            .issue_tracker
            .as_ref()
            .ok_or_else(|| SyncError::NotConfigured("Issue tracker".into()))?;
        let connection = self.get_connection(scope).await?;
        let repository = connection
            .issue_repository
            .as_deref()
            .ok_or_else(|| SyncError::NotConfigured(format!("Issue repository for scope '{}'", scope)))?;

        let mut snapshot = self.get_snapshot(scope, key).await?;
        let index = test_case_index(&snapshot, test_case_id)?;
        if let Some(existing) = &snapshot.test_cases[index].external_ref {
            return Ok(existing.clone());
        }

        let draft = issue_draft(&snapshot, &snapshot.test_cases[index]);
        let reference = tracker
            .create_issue(repository, &draft)
            .await
            .map_err(SyncError::Integration)?;

        snapshot.test_cases[index].external_ref = Some(reference.clone());
        self.store.upsert_snapshot(&snapshot).await?;
        tracing::info!(
            "Linked test case {} in {}/{} to issue {}",
            test_case_id,
            scope,
            key,
            reference.url
        );
        Ok(reference)
    }

    /// Rewrite a test case's steps with the text enhancer, push them to the
    /// remote system and update the cached entry.
    pub async fn enhance_test_case(
        &self,
        scope: &str,
        key: &str,
        test_case_id: u32,
    ) -> SyncResult<PersistedTestCase> {
        let enhancer = self
            .enhancer
            .as_ref()
            .ok_or_else(|| SyncError::NotConfigured("Text enhancer".into()))?;
        let connection = self.get_connection(scope).await?;
        let mut snapshot = self.get_snapshot(scope, key).await?;
        let index = test_case_index(&snapshot, test_case_id)?;

        let test_case = &snapshot.test_cases[index];
        if is_diagnostic(test_case) {
            return Err(SyncError::InvalidInput(format!(
                "Test case {} has no synced content to enhance; sync the scope first",
                test_case_id
            )));
        }

        let current = parse_persisted(&test_case.steps);
        let enhanced = enhancer
            .enhance_steps(&connection.requirements, &test_case.name, &current)
            .await
            .map_err(SyncError::Integration)?;
        if enhanced.is_empty() {
            return Err(SyncError::Integration(anyhow::anyhow!(
                "Text enhancer returned no steps"
            )));
        }

        let api = self
            .connector
            .connect(&connection)
            .map_err(|e| SyncError::ClientSetup(format!("{:#}", e)))?;
        api.update_test_case_steps(test_case_id, &render_markup(&enhanced))
            .await?;

        snapshot.test_cases[index].steps = render_persisted(&enhanced);
        let updated = snapshot.test_cases[index].clone();
        self.store.upsert_snapshot(&snapshot).await?;
        tracing::info!(
            "Enhanced test case {} in {}/{} ({} steps)",
            test_case_id,
            scope,
            key,
            enhanced.len()
        );
        Ok(updated)
    }
}

/// Plans to sync. Configured plans that no longer exist are skipped and
/// counted; any other failure aborts the refresh.
async fn load_plans(
    api: &dyn TestManagementApi,
    connection: &ConnectionConfig,
) -> Result<(Vec<TestPlan>, usize), RemoteError> {
    if connection.plan_ids.is_empty() {
        return Ok((api.list_plans().await?, 0));
    }

    let mut plans = Vec::with_capacity(connection.plan_ids.len());
    let mut missing = 0;
    for &plan_id in &connection.plan_ids {
        match api.get_plan(plan_id).await {
            Ok(plan) => plans.push(plan),
            Err(RemoteError::NotFound { resource }) => {
                tracing::warn!("Configured {} no longer exists, skipping", resource);
                missing += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((plans, missing))
}

/// Walk one plan and materialize its suites, reporting each result.
async fn sync_plan(
    api: Arc<dyn TestManagementApi>,
    plan_index: usize,
    plan: TestPlan,
    width: usize,
    tx: mpsc::UnboundedSender<PlanEvent>,
) {
    let tree = match walk_plan(api.as_ref(), &plan).await {
        Ok(tree) => tree,
        Err(e) => {
            tracing::warn!("Plan {} ('{}') could not be walked: {}", plan.id, plan.name, e);
            let _ = tx.send(PlanEvent::WalkFailed { plan_id: plan.id });
            return;
        }
    };

    let plan_id = plan.id;
    let _ = tx.send(PlanEvent::Walked {
        keys: tree.suites.iter().map(|s| suite_key(plan_id, s.id)).collect(),
    });

    stream::iter(tree.suites.into_iter().enumerate())
        .for_each_concurrent(width, move |(suite_index, suite)| {
            let api = api.clone();
            let tx = tx.clone();
            async move {
                match materialize_suite(api.as_ref(), plan_id, &suite, width).await {
                    Ok(materialized) => {
                        let _ = tx.send(PlanEvent::Suite {
                            plan_index,
                            suite_index,
                            suite: materialized,
                        });
                    }
                    Err(e) => {
                        let key = suite_key(plan_id, suite.id);
                        tracing::warn!("Suite {} ('{}') could not be listed: {}", key, suite.name, e);
                        let _ = tx.send(PlanEvent::SuiteFailed { key });
                    }
                }
            }
        })
        .await;
}

fn test_case_index(snapshot: &SuiteSnapshot, test_case_id: u32) -> SyncResult<usize> {
    snapshot
        .test_cases
        .iter()
        .position(|tc| tc.id == test_case_id)
        .ok_or_else(|| SyncError::TestCaseNotFound {
            key: snapshot.key.clone(),
            id: test_case_id,
        })
}

fn issue_draft(snapshot: &SuiteSnapshot, test_case: &PersistedTestCase) -> IssueDraft {
    let mut body = format!("Suite: {}\n", snapshot.name);
    if let Some(status) = &test_case.status {
        body.push_str(&format!("Status: {}\n", status));
    }
    body.push_str("\nSteps:\n");
    for step in &test_case.steps {
        body.push_str(&format!("- {}\n", step));
    }

    IssueDraft {
        title: format!("Test case {}: {}", test_case.id, test_case.name),
        body,
        labels: vec!["test-case".to_string()],
    }
}
