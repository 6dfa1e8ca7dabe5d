//! Suite synchronization: tree walking, test case materialization,
//! staleness detection and the refresh orchestrator.

pub mod error;
pub mod identifier;
pub mod materializer;
pub mod models;
pub mod orchestrator;
pub mod staleness;
pub mod walker;

pub use error::{SyncError, SyncResult};
pub use identifier::resolve_test_case_id;
pub use models::{SuitesView, SyncReport, TestCaseDetail, ViewSource};
pub use orchestrator::{SyncOptions, SyncOrchestrator};
pub use staleness::is_stale;
pub use walker::{walk_plan, PlanTree, WalkStrategy};
