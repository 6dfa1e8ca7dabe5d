//! Meilisearch-backed snapshot store

use super::models::{ConnectionConfig, SuiteSnapshot};
use super::traits::SnapshotStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use meilisearch_sdk::{
    client::Client,
    documents::DocumentsQuery,
    errors::{Error as MeiliError, ErrorCode},
    settings::Settings,
    task_info::TaskInfo,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Index names
pub mod index_names {
    pub const SNAPSHOTS: &str = "suite_snapshots";
    pub const CONNECTIONS: &str = "scope_connections";
}

const PAGE_SIZE: usize = 500;

/// Stored form of a document: the payload plus its Meilisearch primary key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument<T> {
    id: String,
    #[serde(flatten)]
    doc: T,
}

/// Snapshot store on top of Meilisearch
pub struct MeiliSnapshotStore {
    client: Client,
}

impl MeiliSnapshotStore {
    /// Connect and make sure both indexes exist with their settings
    pub async fn new(url: &str, api_key: &str) -> Result<Self> {
        let client = Client::new(url, Some(api_key)).context("Failed to create Meilisearch client")?;

        let store = Self { client };
        store.init_indexes().await?;

        Ok(store)
    }

    async fn init_indexes(&self) -> Result<()> {
        for index_name in [index_names::SNAPSHOTS, index_names::CONNECTIONS] {
            // Creating an existing index fails the task, which is fine here
            let task = self
                .client
                .create_index(index_name, Some("id"))
                .await
                .context(format!("Failed to create index {}", index_name))?;
            task.wait_for_completion(&self.client, None, None).await?;

            let settings = Settings::new()
                .with_filterable_attributes(["resourceScope"])
                .with_sortable_attributes(["resourceScope"]);
            let task = self.client.index(index_name).set_settings(&settings).await?;
            task.wait_for_completion(&self.client, None, None).await?;
        }

        Ok(())
    }

    async fn wait(&self, task: TaskInfo, what: &str) -> Result<()> {
        let task = task.wait_for_completion(&self.client, None, None).await?;
        if task.is_failure() {
            bail!("Meilisearch task failed: {}", what);
        }
        Ok(())
    }

    async fn get_by_id<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        index_name: &str,
        id: &str,
    ) -> Result<Option<T>> {
        match self
            .client
            .index(index_name)
            .get_document::<StoredDocument<T>>(id)
            .await
        {
            Ok(stored) => Ok(Some(stored.doc)),
            Err(MeiliError::Meilisearch(e)) if matches!(e.error_code, ErrorCode::DocumentNotFound) => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every document of an index matching `filter`, page by page
    async fn fetch_all<T: DeserializeOwned + Send + Sync + 'static>(
        &self,
        index_name: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let index = self.client.index(index_name);
        let mut docs = Vec::new();
        let mut offset = 0;

        loop {
            let mut query = DocumentsQuery::new(&index);
            query.with_offset(offset).with_limit(PAGE_SIZE);
            if let Some(filter) = filter {
                query.with_filter(filter);
            }
            let page = query
                .execute::<StoredDocument<T>>()
                .await
                .context(format!("Failed to list documents of {}", index_name))?;

            let fetched = page.results.len();
            docs.extend(page.results.into_iter().map(|stored| stored.doc));
            offset += fetched;
            if fetched < PAGE_SIZE || offset >= page.total as usize {
                break;
            }
        }

        Ok(docs)
    }

    // ========================================================================
    // Suite snapshots
    // ========================================================================

    pub async fn upsert_snapshot(&self, snapshot: &SuiteSnapshot) -> Result<()> {
        self.upsert_snapshots(std::slice::from_ref(snapshot)).await
    }

    pub async fn upsert_snapshots(&self, snapshots: &[SuiteSnapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let docs: Vec<StoredDocument<&SuiteSnapshot>> = snapshots
            .iter()
            .map(|s| StoredDocument {
                id: Self::snapshot_id(&s.resource_scope, &s.key),
                doc: s,
            })
            .collect();

        // add_documents replaces whole documents (add_or_update would merge)
        let task = self
            .client
            .index(index_names::SNAPSHOTS)
            .add_documents(&docs, Some("id"))
            .await?;
        self.wait(task, "upsert snapshots").await
    }

    pub async fn get_snapshot(&self, resource_scope: &str, key: &str) -> Result<Option<SuiteSnapshot>> {
        self.get_by_id(index_names::SNAPSHOTS, &Self::snapshot_id(resource_scope, key))
            .await
    }

    pub async fn list_snapshots(&self, resource_scope: &str) -> Result<Vec<SuiteSnapshot>> {
        let filter = Self::scope_filter(resource_scope);
        let mut snapshots: Vec<SuiteSnapshot> =
            self.fetch_all(index_names::SNAPSHOTS, Some(&filter)).await?;
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(snapshots)
    }

    pub async fn delete_snapshot(&self, resource_scope: &str, key: &str) -> Result<()> {
        let task = self
            .client
            .index(index_names::SNAPSHOTS)
            .delete_document(&Self::snapshot_id(resource_scope, key))
            .await?;
        self.wait(task, "delete snapshot").await
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub async fn upsert_connection(&self, connection: &ConnectionConfig) -> Result<()> {
        let doc = StoredDocument {
            id: Self::hash_id(&connection.resource_scope),
            doc: connection,
        };
        let task = self
            .client
            .index(index_names::CONNECTIONS)
            .add_documents(&[doc], Some("id"))
            .await?;
        self.wait(task, "upsert connection").await
    }

    pub async fn get_connection(&self, resource_scope: &str) -> Result<Option<ConnectionConfig>> {
        self.get_by_id(index_names::CONNECTIONS, &Self::hash_id(resource_scope))
            .await
    }

    pub async fn list_connections(&self) -> Result<Vec<ConnectionConfig>> {
        self.fetch_all(index_names::CONNECTIONS, None).await
    }

    // ========================================================================
    // Utilities
    // ========================================================================

    /// Meilisearch ids only allow `[A-Za-z0-9_-]`, so identities are hashed
    pub fn hash_id(value: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn snapshot_id(resource_scope: &str, key: &str) -> String {
        Self::hash_id(&format!("{}/{}", resource_scope, key))
    }

    fn scope_filter(resource_scope: &str) -> String {
        format!(
            "resourceScope = \"{}\"",
            resource_scope.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }
}

#[async_trait]
impl SnapshotStore for MeiliSnapshotStore {
    async fn upsert_snapshot(&self, snapshot: &SuiteSnapshot) -> Result<()> {
        self.upsert_snapshot(snapshot).await
    }

    async fn upsert_snapshots(&self, snapshots: &[SuiteSnapshot]) -> Result<()> {
        self.upsert_snapshots(snapshots).await
    }

    async fn get_snapshot(&self, resource_scope: &str, key: &str) -> Result<Option<SuiteSnapshot>> {
        self.get_snapshot(resource_scope, key).await
    }

    async fn list_snapshots(&self, resource_scope: &str) -> Result<Vec<SuiteSnapshot>> {
        self.list_snapshots(resource_scope).await
    }

    async fn delete_snapshot(&self, resource_scope: &str, key: &str) -> Result<()> {
        self.delete_snapshot(resource_scope, key).await
    }

    async fn upsert_connection(&self, connection: &ConnectionConfig) -> Result<()> {
        self.upsert_connection(connection).await
    }

    async fn get_connection(&self, resource_scope: &str) -> Result<Option<ConnectionConfig>> {
        self.get_connection(resource_scope).await
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionConfig>> {
        self.list_connections().await
    }
}
