use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::operations::{catalog, learners, responses};
use crate::db::{now_ms, DatabaseProxy};
use crate::irt::ability::{probability, theta_to_level, update_theta, ProficiencyLevel};
use crate::irt::types::{Item, Learner, ResponseEvent};
use crate::services::interaction_log::{InteractionEvent, InteractionLog};

const STREAK_LOOKBACK: i64 = 50;
const RECENTLY_SEEN: i64 = 20;

#[derive(Debug, thiserror::Error)]
pub enum AbilityError {
    #[error("learner not found: {0}")]
    LearnerNotFound(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerInput {
    pub id: String,
    #[serde(default)]
    pub theta: Option<f64>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInput {
    pub item_id: String,
    pub correct: bool,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
    /// Epoch milliseconds; defaults to the start of the current UTC day.
    #[serde(default)]
    pub session_started_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseOutcome {
    pub response_id: String,
    pub learner_id: String,
    pub item_id: String,
    pub correct: bool,
    pub expected_probability: f64,
    pub previous_theta: f64,
    pub theta: f64,
    pub level: ProficiencyLevel,
}

#[derive(Clone)]
pub struct AbilityService {
    db: Arc<DatabaseProxy>,
    log: InteractionLog,
}

impl AbilityService {
    pub fn new(db: Arc<DatabaseProxy>, log: InteractionLog) -> Self {
        Self { db, log }
    }

    pub async fn get_learner(&self, learner_id: &str) -> Result<Learner, AbilityError> {
        learners::get_learner(self.db.pool(), learner_id)
            .await?
            .ok_or_else(|| AbilityError::LearnerNotFound(learner_id.to_string()))
    }

    pub async fn upsert_learner(&self, input: LearnerInput) -> Result<Learner, AbilityError> {
        if input.id.trim().is_empty() {
            return Err(AbilityError::Validation("learner id is required".to_string()));
        }
        if input.theta.is_some_and(|theta| !theta.is_finite()) {
            return Err(AbilityError::Validation("theta must be a finite number".to_string()));
        }
        let learner = learners::upsert_learner(
            self.db.pool(),
            input.id.trim(),
            input.theta,
            input.role.as_deref(),
            now_ms(),
        )
        .await?;
        tracing::info!(learner_id = %learner.id, theta = learner.theta, "learner upserted");
        Ok(learner)
    }

    /// Appends the response, nudges theta toward the observed outcome and
    /// logs the answer in the background.
    pub async fn record_response(
        &self,
        learner_id: &str,
        input: ResponseInput,
    ) -> Result<ResponseOutcome, AbilityError> {
        let now = now_ms();
        let mut tx = self.db.pool().begin().await?;
        if !learners::touch_learner(&mut *tx, learner_id, now).await? {
            return Err(AbilityError::LearnerNotFound(learner_id.to_string()));
        }
        // Theta is read under the write lock so concurrent answers serialize.
        let learner = learners::get_learner(&mut *tx, learner_id)
            .await?
            .ok_or_else(|| AbilityError::LearnerNotFound(learner_id.to_string()))?;
        let item = catalog::get_item(&mut *tx, &input.item_id)
            .await?
            .ok_or_else(|| AbilityError::ItemNotFound(input.item_id.clone()))?;

        let expected = probability(learner.theta, item.difficulty, item.discrimination);
        let theta = update_theta(learner.theta, item.difficulty, item.discrimination, input.correct);
        let event = ResponseEvent {
            id: Uuid::new_v4().to_string(),
            learner_id: learner.id.clone(),
            item_id: item.id.clone(),
            correct: input.correct,
            timestamp: now,
        };

        responses::insert_response(&mut *tx, &event).await?;
        learners::update_theta(&mut *tx, &learner.id, theta, now).await?;
        tx.commit().await?;

        tracing::debug!(
            learner_id = %learner.id,
            item_id = %item.id,
            correct = input.correct,
            previous = learner.theta,
            theta,
            "theta updated"
        );

        self.log_answer(&learner, &item, &input, now).await;

        Ok(ResponseOutcome {
            response_id: event.id,
            learner_id: learner.id,
            item_id: item.id,
            correct: input.correct,
            expected_probability: expected,
            previous_theta: learner.theta,
            theta,
            level: theta_to_level(theta),
        })
    }

    /// Nearest-difficulty item the learner has not answered recently.
    pub async fn next_item(
        &self,
        learner_id: &str,
        skill: Option<&str>,
    ) -> Result<Option<Item>, AbilityError> {
        let learner = self.get_learner(learner_id).await?;
        let recent = responses::recent_item_ids(self.db.pool(), learner_id, RECENTLY_SEEN).await?;
        let fresh = catalog::closest_item(self.db.pool(), learner.theta, skill, &recent).await?;
        if fresh.is_some() {
            return Ok(fresh);
        }
        Ok(catalog::closest_item(self.db.pool(), learner.theta, skill, &[]).await?)
    }

    /// Context lookups are best effort; a failure only thins out the sample.
    async fn log_answer(&self, learner: &Learner, item: &Item, input: &ResponseInput, now: i64) {
        let recent = responses::recent_outcomes(self.db.pool(), &learner.id, STREAK_LOOKBACK)
            .await
            .unwrap_or_default();
        let (consecutive_correct, consecutive_incorrect) = streaks(&recent);

        let session_start = input.session_started_at.unwrap_or_else(|| start_of_utc_day(now));
        let session_items_answered = responses::count_since(self.db.pool(), &learner.id, session_start)
            .await
            .unwrap_or(0);

        let module = catalog::module_for_item(self.db.pool(), &item.id)
            .await
            .ok()
            .flatten();

        let mut event = InteractionEvent::answer(
            &learner.id,
            &item.id,
            item.difficulty,
            input.correct,
            input.response_time_ms,
        );
        event.learner_level = Some(learner.theta);
        event.learner_role = Some(learner.role.clone());
        event.consecutive_correct = consecutive_correct;
        event.consecutive_incorrect = consecutive_incorrect;
        event.session_items_answered = session_items_answered;
        event.timestamp = Some(now);
        if let Some(module) = module {
            event.module_id = Some(module.id);
            event.module_level = Some(module.level);
            event.module_skill = Some(module.skill);
        }

        if let Err(err) = self.log.record_detached(event) {
            tracing::warn!(error = %err, learner_id = %learner.id, "answer interaction not logged");
        }
    }
}

/// Length of the newest run of identical outcomes, split by kind.
pub fn streaks(newest_first: &[bool]) -> (i64, i64) {
    let Some(&latest) = newest_first.first() else {
        return (0, 0);
    };
    let run = newest_first.iter().take_while(|&&ok| ok == latest).count() as i64;
    if latest {
        (run, 0)
    } else {
        (0, run)
    }
}

fn start_of_utc_day(now_ms: i64) -> i64 {
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    now_ms - now_ms.rem_euclid(DAY_MS)
}
