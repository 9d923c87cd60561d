use std::{
    io,
    path::PathBuf,
    sync::Arc,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use super::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write config {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Whole-document persistence for [`Config`].
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<Config, ConfigError>;
    async fn save(&self, config: &Config) -> Result<(), ConfigError>;
}

/// Stores the config as pretty-printed JSON. Saves go to a sibling temp file which is then
/// renamed over the original, so readers never see a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "config.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: io::Error) -> ConfigError {
        ConfigError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<Config, ConfigError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "No config found at {}, starting with an empty config.",
                    self.path.display()
                );
                return Ok(Config::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let body = serde_json::to_vec_pretty(config)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body)
            .await
            .map_err(|e| self.write_error(e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| self.write_error(e))?;
        debug!("Saved config to {}", self.path.display());
        Ok(())
    }
}

struct Inner {
    store: Box<dyn ConfigStore>,
    current: RwLock<Config>,
    writer: Mutex<()>,
    sequence: Mutex<()>,
}

/// Shared handle to the live config.
///
/// Writers are serialized. A mutation is applied to a copy, the copy is persisted, and only
/// then does it replace the live value, so a failed save leaves both memory and disk untouched.
#[derive(Clone)]
pub struct ConfigService {
    inner: Arc<Inner>,
}

impl ConfigService {
    pub async fn load(store: impl ConfigStore + 'static) -> Result<Self, ConfigError> {
        let config = store.load().await?;
        Ok(Self::with_config(store, config))
    }

    pub fn with_config(store: impl ConfigStore + 'static, config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Box::new(store),
                current: RwLock::new(config),
                writer: Mutex::new(()),
                sequence: Mutex::new(()),
            }),
        }
    }

    /// Snapshot of the current config.
    pub async fn get(&self) -> Config {
        self.inner.current.read().await.clone()
    }

    /// Serializes edits that are followed by an external side effect, so the side effects
    /// happen in the same order as the saves. Hold the guard across [`Self::mutate`] and the
    /// side effect.
    pub async fn lock_sequence(&self) -> MutexGuard<'_, ()> {
        self.inner.sequence.lock().await
    }

    /// Persists the current config as-is.
    pub async fn save(&self) -> Result<(), ConfigError> {
        let _writer = self.inner.writer.lock().await;
        let config = self.get().await;
        self.inner.store.save(&config).await
    }

    /// Applies `edit` to a copy of the config and persists it.
    ///
    /// If `edit` fails nothing is saved. If saving fails the live config is left unchanged.
    pub async fn mutate<T, E, F>(&self, edit: F) -> Result<T, E>
    where
        F: FnOnce(&mut Config) -> Result<T, E>,
        E: From<ConfigError>,
    {
        let _writer = self.inner.writer.lock().await;
        let mut next = self.get().await;
        let value = edit(&mut next)?;
        self.inner.store.save(&next).await?;
        *self.inner.current.write().await = next;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::config::RepoRef;

    struct FlakyStore {
        fail: AtomicBool,
    }

    #[async_trait]
    impl ConfigStore for FlakyStore {
        async fn load(&self) -> Result<Config, ConfigError> {
            Ok(Config::default())
        }

        async fn save(&self, _config: &Config) -> Result<(), ConfigError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConfigError::Write {
                    path: PathBuf::from("flaky.json"),
                    source: io::Error::other("disk full"),
                });
            }
            Ok(())
        }
    }

    #[derive(Debug, Error)]
    enum EditError {
        #[error("rejected")]
        Rejected,
        #[error(transparent)]
        Config(#[from] ConfigError),
    }

    fn repo(value: &str) -> RepoRef {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn missing_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("config.json"));
        assert_eq!(store.load().await.unwrap(), Config::default());
    }

    #[tokio::test]
    async fn mutation_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let service = ConfigService::load(JsonFileStore::new(&path)).await.unwrap();

        service
            .mutate(|config| {
                config.contributor_repos.push(repo("org/a"));
                config.aliases.insert("disgo".into(), "github.com/disgoorg/disgo".into());
                Ok::<_, ConfigError>(())
            })
            .await
            .unwrap();

        let reloaded = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded, service.get().await);
        assert_eq!(reloaded.contributor_repos, vec![repo("org/a")]);
        assert!(!path.with_file_name("config.json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_save_leaves_config_unchanged() {
        let service = ConfigService::with_config(
            FlakyStore {
                fail: AtomicBool::new(true),
            },
            Config::default(),
        );

        let result = service
            .mutate(|config| {
                config.contributor_repos.push(repo("org/a"));
                Ok::<_, EditError>(())
            })
            .await;

        assert!(matches!(result, Err(EditError::Config(_))));
        assert!(service.get().await.contributor_repos.is_empty());
    }

    #[tokio::test]
    async fn rejected_edit_is_not_applied() {
        let service = ConfigService::with_config(
            FlakyStore {
                fail: AtomicBool::new(false),
            },
            Config::default(),
        );

        let result: Result<(), EditError> = service
            .mutate(|config| {
                config.aliases.insert("a".into(), "b".into());
                Err(EditError::Rejected)
            })
            .await;

        assert!(matches!(result, Err(EditError::Rejected)));
        assert!(service.get().await.aliases.is_empty());
    }

    #[tokio::test]
    async fn concurrent_mutations_are_not_lost() {
        let service = ConfigService::with_config(
            FlakyStore {
                fail: AtomicBool::new(false),
            },
            Config::default(),
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .mutate(|config| {
                        config.aliases.insert(format!("alias{i}"), format!("module{i}"));
                        Ok::<_, ConfigError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(service.get().await.aliases.len(), 16);
    }
}
