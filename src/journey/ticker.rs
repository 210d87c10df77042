//! Periodic session-time accumulation

use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::orchestrator::JourneyOrchestrator;
use super::store::KeyValueStore;

/// Adds the tick period to the journey's session time on every tick.
/// Dropping the ticker stops it.
pub struct SessionTicker {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SessionTicker {
    pub fn start<S>(journey: Arc<Mutex<JourneyOrchestrator<S>>>, period: Duration) -> Self
    where
        S: KeyValueStore + Send + 'static,
    {
        let (stop, mut stopped) = oneshot::channel();
        let secs = period.as_secs();
        info!("starting session ticker (interval: {:?})", period);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = interval.tick() => {
                        journey.lock().await.add_session_time(secs);
                        debug!("session ticker added {}s", secs);
                    }
                }
            }
            info!("session ticker stopped");
        });

        Self {
            stop: Some(stop),
            handle,
        }
    }

    /// Stop ticking and wait for the task to finish
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
