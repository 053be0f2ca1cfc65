use serde::{Deserialize, Serialize};

pub const MIN_THETA: f64 = -3.0;
pub const MAX_THETA: f64 = 3.0;
pub const LIVE_UPDATE_K: f64 = 0.5;

/// Upper edges of the first five proficiency bands.
pub const LEVEL_BOUNDARIES: [f64; 5] = [-1.5, -0.5, 0.5, 1.5, 2.5];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProficiencyLevel {
    Diagnostic,
    Foundations,
    Elementary,
    Intermediate,
    UpperIntermediate,
    Advanced,
}

impl ProficiencyLevel {
    pub fn index(&self) -> u8 {
        match self {
            Self::Diagnostic => 0,
            Self::Foundations => 1,
            Self::Elementary => 2,
            Self::Intermediate => 3,
            Self::UpperIntermediate => 4,
            Self::Advanced => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
            Self::Foundations => "foundations",
            Self::Elementary => "elementary",
            Self::Intermediate => "intermediate",
            Self::UpperIntermediate => "upper_intermediate",
            Self::Advanced => "advanced",
        }
    }

    fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Diagnostic,
            1 => Self::Foundations,
            2 => Self::Elementary,
            3 => Self::Intermediate,
            4 => Self::UpperIntermediate,
            _ => Self::Advanced,
        }
    }
}

/// 2PL forward model: `P(correct) = 1 / (1 + exp(-a(θ - b)))`.
pub fn probability(theta: f64, difficulty: f64, discrimination: f64) -> f64 {
    1.0 / (1.0 + (-discrimination * (theta - difficulty)).exp())
}

pub fn theta_to_level(theta: f64) -> ProficiencyLevel {
    if theta.is_nan() {
        return ProficiencyLevel::Diagnostic;
    }
    let band = LEVEL_BOUNDARIES
        .iter()
        .take_while(|edge| theta >= **edge)
        .count();
    ProficiencyLevel::from_index(band)
}

/// Single-response nudge of θ toward the outcome the 2PL model failed to predict.
pub fn update_theta(theta: f64, difficulty: f64, discrimination: f64, correct: bool) -> f64 {
    let expected = probability(theta, difficulty, discrimination);
    let actual = if correct { 1.0 } else { 0.0 };
    theta + LIVE_UPDATE_K * (actual - expected)
}

/// Piecewise-linear map from an aggregate success rate to θ.
///
/// Bands: `>= 0.9` lands at 2.0 and above, `>= 0.7` in [1.0, 2.0),
/// `>= 0.5` in [0.0, 1.0), anything lower is negative.
pub fn success_rate_to_theta(success_rate: f64) -> f64 {
    let rate = success_rate.clamp(0.0, 1.0);
    if rate >= 0.9 {
        2.0 + (rate - 0.9) * 5.0
    } else if rate >= 0.7 {
        1.0 + (rate - 0.7) * 5.0
    } else if rate >= 0.5 {
        (rate - 0.5) * 5.0
    } else {
        -1.0 + rate * 2.0
    }
}

/// External diagnostic scores on a 0-100 scale, one per skill.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalScores {
    #[serde(default)]
    pub reading: Option<f64>,
    #[serde(default)]
    pub writing: Option<f64>,
    #[serde(default)]
    pub listening: Option<f64>,
    #[serde(default)]
    pub speaking: Option<f64>,
}

impl ExternalScores {
    /// Missing skills count as zero, matching how diagnostics are reported upstream.
    pub fn average(&self) -> f64 {
        let scores = [self.reading, self.writing, self.listening, self.speaking];
        let total: f64 = scores
            .iter()
            .map(|score| score.unwrap_or(0.0).clamp(0.0, 100.0))
            .sum();
        total / scores.len() as f64
    }

    pub fn to_theta(&self) -> f64 {
        let span = MAX_THETA - MIN_THETA;
        (self.average() / 100.0) * span + MIN_THETA
    }
}
