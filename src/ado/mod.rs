//! Azure DevOps test-management client

pub mod client;
pub mod error;
pub mod models;
pub mod retry;
pub mod traits;

pub use client::{AdoClient, AdoConnector};
pub use error::{RemoteError, TransientKind};
pub use retry::RetryPolicy;
pub use traits::{RemoteConnector, TestManagementApi};

#[cfg(test)]
pub(crate) mod mock;
