/*!

Contributor role synchronization.

Every sync cycle fetches the contributor list of each tracked repository, computes the linked role
metadata of every registered user from those lists and publishes it as the user's Discord role
connection.

*/

use async_trait::async_trait;
use thiserror::Error;

use crate::config::RepoRef;

mod metadata;
mod scheduler;
mod sync;

pub use metadata::{
    DirectorySnapshot, METADATA_TYPE_INTEGER_GREATER_THAN_OR_EQUAL, RoleMetadata,
    RoleMetadataSchemaEntry, compute_metadata, schema_entries,
};
pub use scheduler::SyncScheduler;
pub use sync::{ContributorSync, CycleReport, SyncError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub username: String,
    pub contributions: u64,
}

impl Contributor {
    pub fn new(username: impl Into<String>, contributions: u64) -> Self {
        Self {
            username: username.into(),
            contributions,
        }
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("repository {0} was not found")]
    NotFound(RepoRef),
    #[error("GitHub responded with {status}: {message}")]
    Api { status: u16, message: String },
}

/// Source of per-repository contributor counts.
#[async_trait]
pub trait ContributorDirectory: Send + Sync {
    /// Lists every contributor of `repo` with a known username, in the directory's order.
    async fn list_contributors(&self, repo: &RepoRef) -> Result<Vec<Contributor>, DirectoryError>;
}
