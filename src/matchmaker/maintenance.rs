//! Periodic maintenance tasks for the matchmaking engine
//!
//! Three independent sweeps run for the lifetime of the service: queue
//! promotion, queue-entry expiry, and lonely-room reaping. Each owns its
//! own tick interval and takes only the locks its sweep body needs; there
//! is no cross-task coordination. A sweep failure is logged and the next
//! tick retries from scratch, so the tasks never terminate on their own.

use crate::matchmaker::engine::MatchmakingEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

/// Handle set for the engine's background sweeps
///
/// Dropping the handle aborts the tasks, so tests tear down without leaked
/// timers. Long-lived owners call [`MaintenanceTasks::shutdown`] explicitly.
pub struct MaintenanceTasks {
    handles: Vec<JoinHandle<()>>,
}

impl MaintenanceTasks {
    /// Spawn the three sweeps with the engine's configured cadences
    pub fn spawn(engine: Arc<MatchmakingEngine>) -> Self {
        let settings = engine.settings().clone();

        let handles = vec![
            Self::spawn_sweep(
                "promotion",
                settings.promotion_interval(),
                engine.clone(),
                |engine| async move { engine.run_promotion_sweep().await.map(|_| ()) },
            ),
            Self::spawn_sweep(
                "queue_expiry",
                settings.queue_sweep_interval(),
                engine.clone(),
                |engine| async move { engine.run_queue_expiry().await.map(|_| ()) },
            ),
            Self::spawn_sweep(
                "room_reaper",
                settings.room_cleanup_interval(),
                engine,
                |engine| async move { engine.run_room_reaper().await.map(|_| ()) },
            ),
        ];

        info!("Started matchmaking maintenance tasks");
        Self { handles }
    }

    fn spawn_sweep<F, Fut>(
        name: &'static str,
        period: Duration,
        engine: Arc<MatchmakingEngine>,
        sweep: F,
    ) -> JoinHandle<()>
    where
        F: Fn(Arc<MatchmakingEngine>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = crate::error::Result<()>> + Send,
    {
        tokio::spawn(async move {
            let mut tick = interval(period);
            // the first interval tick completes immediately; consume it so
            // sweeps start one full period after spawn, like a plain ticker
            tick.tick().await;

            loop {
                tick.tick().await;
                if let Err(e) = sweep(engine.clone()).await {
                    error!(sweep = name, "maintenance sweep failed: {:#}", e);
                }
            }
        })
    }

    /// Abort all sweeps. Idempotent.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Whether any sweep task is still tracked
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }
}

impl Drop for MaintenanceTasks {
    fn drop(&mut self) {
        self.shutdown();
    }
}
