use std::{sync::Arc, time::Duration};

use tokio::{sync::Mutex, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{ContributorSync, SyncError};

/// Runs [`ContributorSync`] cycles on a fixed period until shut down.
///
/// The period is measured from the end of one cycle to the start of the next, so cycles never
/// overlap. Shutdown stops the loop at its next wait and never interrupts a running cycle.
pub struct SyncScheduler {
    interval: Duration,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            shutdown: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Spawns the background loop. Does nothing if it is already running or was shut down.
    pub async fn start(&self, sync: Arc<ContributorSync>) {
        let mut task = self.task.lock().await;
        if task.is_some() || self.shutdown.is_cancelled() {
            warn!("Contributor sync scheduler was already started or shut down, ignoring");
            return;
        }
        info!(
            "Starting contributor sync every {}s",
            self.interval.as_secs()
        );
        *task = Some(tokio::spawn(run(
            sync,
            self.interval,
            self.shutdown.clone(),
        )));
    }

    /// Cancels the loop and waits for an in-flight cycle to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!("Contributor sync task ended abnormally: {}", e);
        }
    }
}

async fn run(sync: Arc<ContributorSync>, interval: Duration, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Contributor sync shutdown requested");
                break;
            }
            _ = sleep(interval) => {
                info!("Refreshing contributor roles...");
                match sync.run_cycle().await {
                    Ok(_) => {}
                    Err(SyncError::AlreadyRunning) => {
                        warn!("Skipping scheduled contributor sync, a cycle is already running");
                    }
                    Err(e) => error!("Failed to update contributor roles: {}", e),
                }
            }
        }
    }
    info!("Contributor sync stopped");
}
