//! Issue tracker and text enhancer collaborators

pub mod enhancer;
pub mod github;
pub mod traits;

pub use enhancer::ChatCompletionEnhancer;
pub use github::GitHubIssues;
pub use traits::{IssueDraft, IssueTracker, TextEnhancer};

#[cfg(test)]
pub(crate) mod mock;
