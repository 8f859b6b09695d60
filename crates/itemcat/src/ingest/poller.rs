//! Periodic ingestion scheduler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use super::runner::IngestWorker;

/// Runs ingestion passes on a fixed interval in a background thread.
pub struct UploadPoller {
    worker: Arc<IngestWorker>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl UploadPoller {
    pub fn new(worker: Arc<IngestWorker>, interval: Duration) -> Self {
        Self {
            worker,
            interval,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the polling loop in a background thread.
    /// Accepts a trigger receiver for passes requested between ticks.
    pub fn start(&self, mut trigger_rx: broadcast::Receiver<()>) -> std::io::Result<JoinHandle<()>> {
        let worker = Arc::clone(&self.worker);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        std::thread::Builder::new()
            .name("upload-poller".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("Upload poller could not start its runtime: {}", e);
                        return;
                    }
                };

                rt.block_on(async {
                    let mut interval_timer = tokio::time::interval(interval);
                    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    interval_timer.tick().await; // skip immediate first tick

                    loop {
                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        tokio::select! {
                            _ = interval_timer.tick() => {},
                            Ok(()) = trigger_rx.recv() => {
                                log::debug!("Ingestion pass triggered");
                            },
                        }

                        if shutdown.load(Ordering::Acquire) {
                            break;
                        }

                        if let Err(e) = worker.run_pass() {
                            log::error!("Ingestion pass failed: {}", e);
                        }
                    }
                });
                log::info!("Upload poller stopped");
            })
    }

    /// Signals the poller to stop after the current pass.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
