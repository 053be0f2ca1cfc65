use std::sync::Arc;

use tracing::{info, warn};

use crate::services::recalibration::{RecalibrationEngine, RetrainOptions, RetrainOutcome};

pub async fn run_scheduled(engine: Arc<RecalibrationEngine>) {
    info!("scheduled recalibration triggered");

    match engine.retrain_model(RetrainOptions::default()).await {
        RetrainOutcome::Completed(summary) => info!(
            version = %summary.version,
            accuracy = summary.metrics.accuracy,
            deployed = summary.deployed,
            "scheduled recalibration finished"
        ),
        RetrainOutcome::Rejected { message } => info!(%message, "scheduled recalibration skipped"),
        RetrainOutcome::Failed { message, version } => {
            warn!(%message, version = ?version, "scheduled recalibration failed")
        }
    }
}
