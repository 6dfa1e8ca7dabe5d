//! Integration tests for the Meilisearch snapshot store
//!
//! These tests require Meilisearch to be running.
//! Run with: cargo test --test integration_tests

use testplan_sync::store::{
    ConnectionConfig, ExternalRef, MeiliSnapshotStore, PersistedTestCase, SnapshotStore,
    SuiteSnapshot,
};
use uuid::Uuid;

fn meili_url() -> String {
    std::env::var("MEILISEARCH_URL").unwrap_or_else(|_| "http://localhost:7700".into())
}

fn meili_key() -> String {
    std::env::var("MEILISEARCH_KEY").unwrap_or_else(|_| "testplan-meili-key-change-me".into())
}

/// Check if Meilisearch is available
async fn meilisearch_available() -> bool {
    let ok = reqwest::get(format!("{}/health", meili_url()))
        .await
        .map(|r| r.status().is_success())
        .unwrap_or(false);
    if !ok {
        eprintln!("Meilisearch not available at {}", meili_url());
    }
    ok
}

/// A scope name no other run uses
fn unique_scope() -> String {
    format!("it-{}", Uuid::new_v4())
}

fn snapshot(scope: &str, key: &str, names: &[&str]) -> SuiteSnapshot {
    SuiteSnapshot {
        resource_scope: scope.to_string(),
        name: format!("Suite {}", key),
        key: key.to_string(),
        test_cases: names
            .iter()
            .enumerate()
            .map(|(i, name)| PersistedTestCase {
                id: i as u32 + 1,
                name: name.to_string(),
                steps: vec![format!("Step 1: Run {} - Expected: It passes", name)],
                status: Some("Ready".into()),
                external_ref: None,
                error: None,
            })
            .collect(),
    }
}

#[tokio::test]
async fn test_snapshot_lifecycle() {
    if !meilisearch_available().await {
        eprintln!("Skipping test: Meilisearch not available");
        return;
    }

    let store = MeiliSnapshotStore::new(&meili_url(), &meili_key())
        .await
        .unwrap();
    let scope = unique_scope();

    store
        .upsert_snapshots(&[
            snapshot(&scope, "1-3", &["Checkout"]),
            snapshot(&scope, "1-2", &["Login", "Logout"]),
        ])
        .await
        .unwrap();

    let listed = store.list_snapshots(&scope).await.unwrap();
    let keys: Vec<&str> = listed.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(keys, vec!["1-2", "1-3"]);

    // Whole-document replacement
    let mut replaced = snapshot(&scope, "1-2", &["Login"]);
    replaced.test_cases[0].external_ref = Some(ExternalRef {
        id: "42".into(),
        url: "https://github.com/contoso/web/issues/42".into(),
    });
    store.upsert_snapshot(&replaced).await.unwrap();
    let fetched = store.get_snapshot(&scope, "1-2").await.unwrap().unwrap();
    assert_eq!(fetched, replaced);

    store.delete_snapshot(&scope, "1-3").await.unwrap();
    assert!(store.get_snapshot(&scope, "1-3").await.unwrap().is_none());

    // Other scopes are isolated
    assert!(store
        .list_snapshots(&unique_scope())
        .await
        .unwrap()
        .is_empty());

    store.delete_snapshot(&scope, "1-2").await.unwrap();
}

#[tokio::test]
async fn test_connection_roundtrip() {
    if !meilisearch_available().await {
        eprintln!("Skipping test: Meilisearch not available");
        return;
    }

    let store = MeiliSnapshotStore::new(&meili_url(), &meili_key())
        .await
        .unwrap();
    let scope = unique_scope();
    let connection = ConnectionConfig {
        resource_scope: scope.clone(),
        organization: "contoso".into(),
        project: "Web Shop".into(),
        issue_repository: Some("contoso/web".into()),
        requirements: "Users sign in with email.".into(),
        plan_ids: vec![1, 5],
    };

    assert!(store.get_connection(&scope).await.unwrap().is_none());
    store.upsert_connection(&connection).await.unwrap();
    assert_eq!(store.get_connection(&scope).await.unwrap(), Some(connection));
    assert!(store
        .list_connections()
        .await
        .unwrap()
        .iter()
        .any(|c| c.resource_scope == scope));
}
