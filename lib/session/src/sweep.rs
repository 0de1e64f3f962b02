//! Background removal of expired sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::manager::SessionManager;

/// Spawns a task that calls [`SessionManager::sweep_expired`] every `period`.
///
/// The first sweep runs immediately. Failures are logged and the task keeps
/// going; dropping the handle does not stop it, aborting does.
pub fn spawn_sweeper(manager: Arc<SessionManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "session sweeper started");
        loop {
            interval.tick().await;
            if let Err(e) = manager.sweep_expired().await {
                warn!(error = %e, "session sweep failed");
            }
        }
    })
}
