use crate::services::interaction_log::InteractionLog;
use crate::workers::WorkerError;

pub async fn purge_expired(interactions: InteractionLog) -> Result<u64, WorkerError> {
    let days = interactions.config().retention_days;
    let deleted = interactions.purge_older_than_days(days).await?;
    if deleted > 0 {
        tracing::info!(deleted, days, "expired interaction samples removed");
    }
    Ok(deleted)
}
