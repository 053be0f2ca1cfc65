//! Success-rate driven recalibration of item difficulty and learner ability.
//!
//! Two passes over a batch of answer samples: aggregate counts per item and per
//! anonymized learner, then turn each success rate into a suggested parameter.
//! This is a heuristic, not a maximum-likelihood IRT fit.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ability::success_rate_to_theta;
use super::types::{
    DifficultySummary, DistributionSummary, InteractionSample, InteractionType, ModelParameters,
    DEFAULT_DISCRIMINATION,
};

pub const TOO_EASY_RATE: f64 = 0.8;
pub const TOO_HARD_RATE: f64 = 0.3;
pub const DIFFICULTY_STEP: f64 = 0.2;
pub const LINEAR_GAIN: f64 = 0.4;

const ADJUSTMENT_FACTOR: f64 = 0.1;
const DISCRIMINATION_VARIANCE: f64 = 0.2;
const LEARNING_RATE: f64 = 0.01;
const CONVERGENCE_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemStats {
    pub attempts: u64,
    pub correct: u64,
    pub total_response_time_ms: i64,
    pub difficulties: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnerStats {
    pub attempts: u64,
    pub correct: u64,
    pub levels: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchAggregate {
    pub items: BTreeMap<String, ItemStats>,
    pub learners: BTreeMap<String, LearnerStats>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyAdjustment {
    pub current_difficulty: f64,
    pub suggested_difficulty: f64,
    pub success_rate: f64,
    pub sample_size: u64,
    pub mean_response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityAdjustment {
    pub current_level: f64,
    pub estimated_theta: f64,
    pub success_rate: f64,
    pub sample_size: u64,
}

/// Transient per-run tables. Only the summary in [`ModelParameters`] is persisted.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTables {
    pub items: BTreeMap<String, DifficultyAdjustment>,
    pub learners: BTreeMap<String, AbilityAdjustment>,
}

impl CalibrationTables {
    pub fn suggested_difficulties(&self) -> Vec<(String, f64)> {
        self.items
            .iter()
            .map(|(id, adj)| (id.clone(), adj.suggested_difficulty))
            .collect()
    }
}

/// Pass 1. Samples lacking an item id or a correctness label are skipped.
pub fn aggregate(samples: &[InteractionSample]) -> BatchAggregate {
    let mut batch = BatchAggregate::default();

    for sample in samples {
        if sample.interaction_type != InteractionType::Answer {
            batch.skipped += 1;
            continue;
        }
        let (Some(item_id), Some(correct)) = (sample.item_id.as_ref(), sample.correct) else {
            batch.skipped += 1;
            continue;
        };
        if sample.anonymized_learner_id.is_empty() {
            batch.skipped += 1;
            continue;
        }

        let item = batch.items.entry(item_id.clone()).or_default();
        item.attempts += 1;
        if correct {
            item.correct += 1;
        }
        if let Some(rt) = sample.response_time_ms {
            item.total_response_time_ms += rt;
        }
        if let Some(difficulty) = sample.item_difficulty {
            item.difficulties.push(difficulty);
        }

        let learner = batch
            .learners
            .entry(sample.anonymized_learner_id.clone())
            .or_default();
        learner.attempts += 1;
        if correct {
            learner.correct += 1;
        }
        if let Some(level) = sample.learner_level {
            learner.levels.push(level);
        }
    }

    batch
}

pub fn difficulty_step(success_rate: f64) -> f64 {
    if success_rate > TOO_EASY_RATE {
        DIFFICULTY_STEP
    } else if success_rate < TOO_HARD_RATE {
        -DIFFICULTY_STEP
    } else {
        (0.5 - success_rate) * LINEAR_GAIN
    }
}

pub fn adjust_difficulty(stats: &ItemStats) -> DifficultyAdjustment {
    let success_rate = ratio(stats.correct, stats.attempts);
    let current_difficulty = mean(&stats.difficulties);
    let mean_response_time_ms = (stats.attempts > 0 && stats.total_response_time_ms > 0)
        .then(|| stats.total_response_time_ms as f64 / stats.attempts as f64);

    DifficultyAdjustment {
        current_difficulty,
        suggested_difficulty: current_difficulty + difficulty_step(success_rate),
        success_rate,
        sample_size: stats.attempts,
        mean_response_time_ms,
    }
}

pub fn estimate_ability(stats: &LearnerStats) -> AbilityAdjustment {
    let success_rate = ratio(stats.correct, stats.attempts);
    AbilityAdjustment {
        current_level: mean(&stats.levels),
        estimated_theta: success_rate_to_theta(success_rate),
        success_rate,
        sample_size: stats.attempts,
    }
}

/// Pass 2.
pub fn calibrate(batch: &BatchAggregate) -> CalibrationTables {
    CalibrationTables {
        items: batch
            .items
            .iter()
            .map(|(id, stats)| (id.clone(), adjust_difficulty(stats)))
            .collect(),
        learners: batch
            .learners
            .iter()
            .map(|(id, stats)| (id.clone(), estimate_ability(stats)))
            .collect(),
    }
}

pub fn summarize(tables: &CalibrationTables, sample_count: usize) -> ModelParameters {
    let difficulties: Vec<f64> = tables
        .items
        .values()
        .map(|adj| adj.suggested_difficulty)
        .collect();
    let abilities: Vec<f64> = tables
        .learners
        .values()
        .map(|adj| adj.estimated_theta)
        .collect();

    ModelParameters {
        difficulty: DifficultySummary {
            mean: mean(&difficulties),
            variance: variance(&difficulties),
            adjustment_factor: ADJUSTMENT_FACTOR,
        },
        discrimination: DistributionSummary {
            mean: DEFAULT_DISCRIMINATION,
            variance: DISCRIMINATION_VARIANCE,
        },
        ability_estimates: DistributionSummary {
            mean: mean(&abilities),
            variance: variance(&abilities),
        },
        learning_rate: LEARNING_RATE,
        iterations: sample_count,
        convergence_threshold: CONVERGENCE_THRESHOLD,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; zero for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}
