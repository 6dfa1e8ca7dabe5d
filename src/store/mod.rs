//! Document store for suite snapshots and scope connections

pub mod meili;
pub mod memory;
pub mod models;
pub mod traits;

pub use meili::MeiliSnapshotStore;
pub use memory::InMemorySnapshotStore;
pub use models::{ConnectionConfig, ExternalRef, PersistedTestCase, SuiteSnapshot};
pub use traits::SnapshotStore;
