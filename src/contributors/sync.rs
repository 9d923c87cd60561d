use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::Utc;
use poise::serenity_prelude::futures::future;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{
    ContributorDirectory, DirectoryError, DirectorySnapshot, compute_metadata,
};
use crate::{
    config::{ConfigService, RepoRef},
    linked_accounts::RegisteredUserSource,
    role_connections::RoleConnectionPublisher,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a contributor sync is already running")]
    AlreadyRunning,
    #[error("failed to fetch contributors of {repo}: {source}")]
    Directory {
        repo: RepoRef,
        source: DirectoryError,
    },
    #[error("failed to list registered users: {0}")]
    Users(#[from] DbErr),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub users: usize,
    pub published: usize,
    pub failed: usize,
}

/// Clears the in-progress flag when the cycle ends, including on early return.
struct CycleGuard<'a>(&'a AtomicBool);

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Publishes contributor counts of tracked repositories as linked role metadata.
pub struct ContributorSync {
    config: ConfigService,
    directory: Arc<dyn ContributorDirectory>,
    users: Arc<dyn RegisteredUserSource>,
    publisher: Arc<dyn RoleConnectionPublisher>,
    running: AtomicBool,
}

impl ContributorSync {
    pub fn new(
        config: ConfigService,
        directory: Arc<dyn ContributorDirectory>,
        users: Arc<dyn RegisteredUserSource>,
        publisher: Arc<dyn RoleConnectionPublisher>,
    ) -> Self {
        Self {
            config,
            directory,
            users,
            publisher,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs one sync cycle.
    ///
    /// A failed fetch for any repository aborts the cycle before anything is published. A failed
    /// publish only affects that user and is counted in the report.
    pub async fn run_cycle(&self) -> Result<CycleReport, SyncError> {
        let Some(_guard) = CycleGuard::acquire(&self.running) else {
            return Err(SyncError::AlreadyRunning);
        };

        let repos = self.config.get().await.contributor_repos;
        let snapshot = self.fetch_snapshot(&repos).await?;
        let users = self.users.list_all_registered_users().await?;

        let mut report = CycleReport {
            users: users.len(),
            ..Default::default()
        };
        let now = Utc::now();
        for user in users {
            let metadata = compute_metadata(&user.username, &repos, &snapshot);
            if user.session.is_expired_at(now) {
                warn!(
                    "Session of {} expired at {}, publishing anyway",
                    user.username, user.session.expiration
                );
            }
            debug!("Publishing metadata for {}: {:?}", user.username, metadata);
            match self
                .publisher
                .update_role_connection(&user.session, &metadata)
                .await
            {
                Ok(()) => report.published += 1,
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to update contributor roles of {}: {}", user.username, e);
                }
            }
        }

        info!(
            users = report.users,
            published = report.published,
            failed = report.failed,
            "Contributor sync finished"
        );
        Ok(report)
    }

    async fn fetch_snapshot(&self, repos: &[RepoRef]) -> Result<DirectorySnapshot, SyncError> {
        let fetches = repos.iter().map(|repo| async move {
            self.directory
                .list_contributors(repo)
                .await
                .map(|contributors| (repo.clone(), contributors))
                .map_err(|source| SyncError::Directory {
                    repo: repo.clone(),
                    source,
                })
        });
        Ok(future::try_join_all(fetches).await?.into_iter().collect())
    }
}
