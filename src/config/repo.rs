use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discord rejects role connection metadata keys longer than this.
pub const MAX_METADATA_KEY_LEN: usize = 50;

const METADATA_KEY_SUFFIX: &str = "_contributions";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoRefError {
    #[error("`{0}` is not in owner/name form")]
    Malformed(String),
    #[error("`{0}` is not a valid repository owner")]
    InvalidOwner(String),
    #[error("`{0}` is not a valid repository name")]
    InvalidName(String),
    #[error("metadata key for `{0}` would exceed {MAX_METADATA_KEY_LEN} characters")]
    KeyTooLong(String),
    #[error("metadata key for `{0}` may only contain lowercase letters, digits and `_`")]
    KeyCharacters(String),
}

/// A tracked GitHub repository, stored as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoRef {
    owner: String,
    name: String,
}

impl RepoRef {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role connection metadata key for this repository, e.g. `org_repo_contributions`.
    ///
    /// Owners cannot contain `_`, so the first `_` always marks the owner boundary and
    /// distinct repositories never share a key.
    pub fn metadata_key(&self) -> String {
        format!("{}_{}{}", self.owner, self.name, METADATA_KEY_SUFFIX)
    }
}

fn valid_owner(owner: &str) -> bool {
    !owner.is_empty()
        && !owner.starts_with('-')
        && owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Discord only accepts `a-z`, `0-9` and `_` in role connection metadata keys.
fn valid_key_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

impl FromStr for RepoRef {
    type Err = RepoRefError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (owner, name) = value
            .split_once('/')
            .filter(|(_, name)| !name.contains('/'))
            .ok_or_else(|| RepoRefError::Malformed(value.to_string()))?;

        if !valid_owner(owner) {
            return Err(RepoRefError::InvalidOwner(owner.to_string()));
        }
        if !valid_name(name) {
            return Err(RepoRefError::InvalidName(name.to_string()));
        }

        let repo = RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
        };
        let key = repo.metadata_key();
        if key.len() > MAX_METADATA_KEY_LEN {
            return Err(RepoRefError::KeyTooLong(value.to_string()));
        }
        if !key.chars().all(valid_key_char) {
            return Err(RepoRefError::KeyCharacters(value.to_string()));
        }
        Ok(repo)
    }
}

impl TryFrom<String> for RepoRef {
    type Error = RepoRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RepoRef> for String {
    fn from(value: RepoRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_name() {
        let repo: RepoRef = "disgoorg/disgo".parse().unwrap();
        assert_eq!(repo.owner(), "disgoorg");
        assert_eq!(repo.name(), "disgo");
        assert_eq!(repo.to_string(), "disgoorg/disgo");
    }

    #[test]
    fn derives_metadata_key() {
        let repo: RepoRef = "org/a".parse().unwrap();
        assert_eq!(repo.metadata_key(), "org_a_contributions");

        let repo: RepoRef = "myorg2/some_repo".parse().unwrap();
        assert_eq!(repo.metadata_key(), "myorg2_some_repo_contributions");
    }

    #[test]
    fn distinct_repos_have_distinct_keys() {
        let a: RepoRef = "a/b_c".parse().unwrap();
        let b: RepoRef = "ab/c".parse().unwrap();
        assert_ne!(a.metadata_key(), b.metadata_key());
        assert_eq!(
            "a_b/c".parse::<RepoRef>(),
            Err(RepoRefError::InvalidOwner("a_b".into()))
        );
    }

    #[test]
    fn rejects_malformed_refs() {
        assert!(matches!(
            "disgo".parse::<RepoRef>(),
            Err(RepoRefError::Malformed(_))
        ));
        assert!(matches!(
            "a/b/c".parse::<RepoRef>(),
            Err(RepoRefError::Malformed(_))
        ));
        assert!(matches!(
            "/disgo".parse::<RepoRef>(),
            Err(RepoRefError::InvalidOwner(_))
        ));
        assert!(matches!(
            "org/".parse::<RepoRef>(),
            Err(RepoRefError::InvalidName(_))
        ));
    }

    #[test]
    fn rejects_keys_discord_would_refuse() {
        let long = format!("org/{}", "x".repeat(40));
        assert!(matches!(
            long.parse::<RepoRef>(),
            Err(RepoRefError::KeyTooLong(_))
        ));
    }

    #[test]
    fn rejects_keys_outside_discord_alphabet() {
        for repo in ["DisgoOrg/disgo-butler", "disgoorg/Disgo", "my-org/a", "org/repo.rs"] {
            assert_eq!(
                repo.parse::<RepoRef>(),
                Err(RepoRefError::KeyCharacters(repo.to_string())),
                "{repo}"
            );
        }
    }

    #[test]
    fn serializes_as_plain_string() {
        let repo: RepoRef = "org/a".parse().unwrap();
        assert_eq!(serde_json::to_string(&repo).unwrap(), "\"org/a\"");
        let back: RepoRef = serde_json::from_str("\"org/a\"").unwrap();
        assert_eq!(back, repo);
        assert!(serde_json::from_str::<RepoRef>("\"nope\"").is_err());
    }
}
