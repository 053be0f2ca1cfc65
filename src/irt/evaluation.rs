use super::ability::probability;
use super::calibration::CalibrationTables;
use super::types::{EvaluationMetrics, InteractionSample, DEFAULT_DISCRIMINATION};

const DECISION_THRESHOLD: f64 = 0.5;

/// Replays every labelled sample through the 2PL model using the freshly
/// calibrated difficulty and ability tables.
///
/// Precision and recall are reported equal to accuracy and `logLikelihood` is
/// the negated sum of squared errors. Both are known approximations.
pub fn evaluate(samples: &[InteractionSample], tables: &CalibrationTables) -> EvaluationMetrics {
    let mut hits = 0usize;
    let mut total = 0usize;
    let mut sum_squared_error = 0.0;
    let mut sum_absolute_error = 0.0;

    for sample in samples {
        let (Some(item_id), Some(actual)) = (sample.item_id.as_ref(), sample.correct) else {
            continue;
        };
        let Some(item) = tables.items.get(item_id) else {
            continue;
        };
        let Some(learner) = tables.learners.get(&sample.anonymized_learner_id) else {
            continue;
        };

        let predicted_prob = probability(
            learner.estimated_theta,
            item.suggested_difficulty,
            DEFAULT_DISCRIMINATION,
        );
        let predicted = predicted_prob >= DECISION_THRESHOLD;
        if predicted == actual {
            hits += 1;
        }
        total += 1;

        let error = predicted_prob - if actual { 1.0 } else { 0.0 };
        sum_squared_error += error * error;
        sum_absolute_error += error.abs();
    }

    if total == 0 {
        return EvaluationMetrics::default();
    }

    let n = total as f64;
    let accuracy = hits as f64 / n;
    let precision = accuracy;
    let recall = accuracy;
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    EvaluationMetrics {
        accuracy,
        precision,
        recall,
        f1_score,
        rmse: (sum_squared_error / n).sqrt(),
        mae: sum_absolute_error / n,
        log_likelihood: -sum_squared_error,
        evaluated_samples: total,
    }
}
