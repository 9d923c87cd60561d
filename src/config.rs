/*!

Durable bot configuration: module aliases, release announcement webhooks and the repositories
whose contributors receive linked role metadata.

The whole document is rewritten on every change. Access goes through [`ConfigService`], which
serializes writers and only publishes a change to readers once it has been persisted.

*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod repo;
mod store;

pub use repo::{MAX_METADATA_KEY_LEN, RepoRef, RepoRefError};
pub use store::{ConfigError, ConfigService, ConfigStore, JsonFileStore};

/// Discord allows at most this many role connection metadata records per application.
pub const MAX_TRACKED_REPOS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// alias -> module path, read by the external documentation lookup service
    pub aliases: BTreeMap<String, String>,
    /// announcement name -> webhook binding
    pub releases: BTreeMap<String, ReleaseBinding>,
    pub contributor_repos: Vec<RepoRef>,
}

/// A channel webhook that receives release announcements, pinging `ping_role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseBinding {
    pub webhook_id: u64,
    pub webhook_url: String,
    pub ping_role: u64,
}

impl Config {
    pub fn tracks_repo(&self, repo: &RepoRef) -> bool {
        self.contributor_repos.contains(repo)
    }
}
