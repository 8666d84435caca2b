use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::{AlertError, Result};
use crate::services::alert_engine::AlertEngine;

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic driver for [`AlertEngine::run_tick`].
///
/// Ticks never overlap: a tick that overruns the interval makes the missed
/// ticks get skipped instead of queued. Stopping lets the in-flight tick
/// finish; no tick starts after `stop` returns.
pub struct AlertMonitor {
    engine: Arc<AlertEngine>,
    running: Mutex<Option<Running>>,
}

impl AlertMonitor {
    pub fn new(engine: Arc<AlertEngine>) -> Self {
        Self {
            engine,
            running: Mutex::new(None),
        }
    }

    pub fn start(&self, every: Duration) -> Result<()> {
        if every.is_zero() {
            return Err(AlertError::SchedulerUnavailable(
                "tick interval must be greater than zero".to_string(),
            ));
        }

        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| AlertError::SchedulerUnavailable(e.to_string()))?;

        let mut running = self.running.lock();
        if running.is_some() {
            return Err(AlertError::SchedulerUnavailable(
                "alert monitor is already running".to_string(),
            ));
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let engine = Arc::clone(&self.engine);

        let handle = rt.spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = interval.tick() => {}
                }

                // not raced against stop: a started tick always completes
                engine.run_tick(chrono::Utc::now().timestamp()).await;

                if *stop_rx.borrow() {
                    break;
                }
            }

            tracing::info!("alert monitor stopped");
        });

        tracing::info!(interval_secs = every.as_secs_f64(), "alert monitor started");
        *running = Some(Running { stop_tx, handle });
        Ok(())
    }

    /// Waits for the in-flight tick, if any, then returns.
    pub async fn stop(&self) {
        let running = self.running.lock().take();

        if let Some(Running { stop_tx, handle }) = running {
            let _ = stop_tx.send(true);
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "alert monitor task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}
