use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::Contributor;
use crate::config::RepoRef;

/// Discord's `INTEGER_GREATER_THAN_OR_EQUAL` role connection metadata type.
pub const METADATA_TYPE_INTEGER_GREATER_THAN_OR_EQUAL: u8 = 2;

/// Contributor lists fetched during a single sync cycle.
pub type DirectorySnapshot = HashMap<RepoRef, Vec<Contributor>>;

/// Role connection metadata of one user, metadata key -> contribution count.
pub type RoleMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMetadataSchemaEntry {
    #[serde(rename = "type")]
    pub kind: u8,
    pub key: String,
    pub name: String,
    pub description: String,
}

impl RoleMetadataSchemaEntry {
    pub fn for_repo(repo: &RepoRef) -> Self {
        Self {
            kind: METADATA_TYPE_INTEGER_GREATER_THAN_OR_EQUAL,
            key: repo.metadata_key(),
            name: format!("Contributions to {}", repo),
            description: format!("The amount of contributions you have made to {} project", repo),
        }
    }
}

pub fn schema_entries(repos: &[RepoRef]) -> Vec<RoleMetadataSchemaEntry> {
    repos.iter().map(RoleMetadataSchemaEntry::for_repo).collect()
}

/// Builds `username`'s metadata from `snapshot`.
///
/// Usernames match case-sensitively. Repositories the user does not appear in are left out
/// rather than reported as zero.
pub fn compute_metadata(
    username: &str,
    repos: &[RepoRef],
    snapshot: &DirectorySnapshot,
) -> RoleMetadata {
    repos
        .iter()
        .filter_map(|repo| {
            let contributor = snapshot
                .get(repo)?
                .iter()
                .find(|c| c.username == username)?;
            Some((repo.metadata_key(), contributor.contributions.to_string()))
        })
        .collect()
}
