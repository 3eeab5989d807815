//! Foreground re-validation driven by app lifecycle events

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::domains::session::manager::SessionManager;
use crate::infra::services::platform::AppState;

/// Owns the lifecycle watcher task. Dropping it unsubscribes.
#[derive(Debug)]
pub struct LifecycleWatch {
    handle: JoinHandle<()>,
}

impl LifecycleWatch {
    pub(crate) fn spawn(
        manager: SessionManager,
        mut receiver: broadcast::Receiver<AppState>,
        initial: AppState,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut previous = initial;
            loop {
                match receiver.recv().await {
                    Ok(next) => {
                        manager.handle_app_state_change(previous, next);
                        previous = next;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "[LifecycleWatch] Missed {} lifecycle events",
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => {
                        debug!("[LifecycleWatch] Lifecycle source closed");
                        break;
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop watching. Same as dropping the guard.
    pub fn stop(self) {}
}

impl Drop for LifecycleWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
