mod recalibration;
mod retention;

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};

use crate::config::{Config, WorkerConfig};
use crate::services::interaction_log::InteractionLog;
use crate::services::recalibration::RecalibrationEngine;

/// Cron jobs owned by the leader instance. Followers construct the manager
/// but never schedule anything.
pub struct WorkerManager {
    scheduler: Mutex<JobScheduler>,
    shutdown_tx: watch::Sender<bool>,
    workers: WorkerConfig,
    recalibration_schedule: String,
    retention_schedule: String,
    engine: Arc<RecalibrationEngine>,
    interactions: InteractionLog,
    started: Mutex<bool>,
}

impl WorkerManager {
    pub async fn new(
        config: &Config,
        engine: Arc<RecalibrationEngine>,
        interactions: InteractionLog,
    ) -> Result<Self, WorkerError> {
        let scheduler = JobScheduler::new().await?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            shutdown_tx,
            workers: config.workers.clone(),
            recalibration_schedule: config.recalibration.schedule.clone(),
            retention_schedule: config.interactions.retention_schedule.clone(),
            engine,
            interactions,
            started: Mutex::new(false),
        })
    }

    pub async fn start(&self) -> Result<(), WorkerError> {
        if !self.workers.leader {
            info!("WORKER_LEADER not set, skipping worker startup");
            return Ok(());
        }

        info!("starting workers (leader mode)");
        let scheduler = self.scheduler.lock().await;

        if self.workers.recalibration_enabled {
            let engine = Arc::clone(&self.engine);
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(self.recalibration_schedule.as_str(), move |_uuid, _lock| {
                let engine = Arc::clone(&engine);
                let shutdown_rx = shutdown_rx.clone();
                Box::pin(async move {
                    // A run in flight is allowed to finish; only new runs are skipped.
                    if *shutdown_rx.borrow() {
                        return;
                    }
                    recalibration::run_scheduled(engine).await;
                })
            })?;
            scheduler.add(job).await?;
            info!(schedule = %self.recalibration_schedule, "recalibration worker scheduled");
        }

        if self.workers.retention_enabled {
            let interactions = self.interactions.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let job = Job::new_async(self.retention_schedule.as_str(), move |_uuid, _lock| {
                let interactions = interactions.clone();
                let mut rx = shutdown_rx.clone();
                Box::pin(async move {
                    tokio::select! {
                        _ = rx.changed() => {},
                        result = retention::purge_expired(interactions) => {
                            if let Err(e) = result {
                                tracing::error!(error = %e, "retention worker error");
                            }
                        }
                    }
                })
            })?;
            scheduler.add(job).await?;
            info!(schedule = %self.retention_schedule, "retention worker scheduled");
        }

        scheduler.start().await?;
        *self.started.lock().await = true;
        info!("all workers started");
        Ok(())
    }

    pub async fn stop(&self) {
        let mut started = self.started.lock().await;
        if !*started {
            return;
        }

        info!("stopping workers");
        let _ = self.shutdown_tx.send(true);

        let mut scheduler = self.scheduler.lock().await;
        if let Err(e) = scheduler.shutdown().await {
            warn!(error = %e, "error shutting down scheduler");
        }
        *started = false;
        info!("workers stopped");
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    #[error("Interaction log error: {0}")]
    Interactions(#[from] crate::services::interaction_log::InteractionError),
}
