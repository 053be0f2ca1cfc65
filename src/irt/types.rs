use serde::{Deserialize, Serialize};

pub const DEFAULT_DISCRIMINATION: f64 = 1.0;
pub const DEFAULT_SKILLS: [&str; 4] = ["reading", "writing", "listening", "speaking"];

fn default_discrimination() -> f64 {
    DEFAULT_DISCRIMINATION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: String,
    pub theta: f64,
    pub role: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub difficulty: f64,
    #[serde(default = "default_discrimination")]
    pub discrimination: f64,
    pub skill: String,
}

/// Per-module snapshot of an item's parameters, taken when the module was authored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default = "default_discrimination")]
    pub discrimination: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub skill: String,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub items: Vec<ModuleItem>,
}

impl Module {
    pub fn average_difficulty(&self) -> Option<f64> {
        if self.items.is_empty() {
            return None;
        }
        let total: f64 = self.items.iter().map(|item| item.difficulty).sum();
        Some(total / self.items.len() as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEvent {
    pub id: String,
    pub learner_id: String,
    pub item_id: String,
    pub correct: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Answer,
    Click,
    PageView,
    ModuleStart,
    ModuleComplete,
    SessionStart,
    SessionEnd,
}

impl InteractionType {
    pub const ALL: [InteractionType; 7] = [
        Self::Answer,
        Self::Click,
        Self::PageView,
        Self::ModuleStart,
        Self::ModuleComplete,
        Self::SessionStart,
        Self::SessionEnd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Click => "click",
            Self::PageView => "page_view",
            Self::ModuleStart => "module_start",
            Self::ModuleComplete => "module_complete",
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }

    /// Anything but an answer can be dropped without affecting recalibration.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Answer)
    }
}

/// One anonymized row of the interaction log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSample {
    pub id: String,
    pub anonymized_learner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_role: Option<String>,
    pub interaction_type: InteractionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_difficulty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_skill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_clicked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<String>,
    pub consecutive_correct: i64,
    pub consecutive_incorrect: i64,
    pub session_items_answered: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Training,
    Completed,
    Failed,
    Deployed,
    Archived,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Deployed => "deployed",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "training" => Some(Self::Training),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "deployed" => Some(Self::Deployed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn is_promotable(&self) -> bool {
        matches!(self, Self::Completed | Self::Deployed)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct DistributionSummary {
    pub mean: f64,
    pub variance: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultySummary {
    pub mean: f64,
    pub variance: f64,
    pub adjustment_factor: f64,
}

/// Persisted parameter bundle of a model version. Per-item and per-learner
/// tables never land here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    pub difficulty: DifficultySummary,
    pub discrimination: DistributionSummary,
    pub ability_estimates: DistributionSummary,
    pub learning_rate: f64,
    pub iterations: usize,
    pub convergence_threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub rmse: f64,
    pub mae: f64,
    pub log_likelihood: f64,
    pub evaluated_samples: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    pub batch_size: u32,
    pub validation_split: f64,
    pub random_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            validation_split: 0.2,
            random_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub timestamp: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersion {
    pub id: String,
    pub version: String,
    pub version_number: i64,
    pub model_type: String,
    pub training_data_count: i64,
    pub training_started_at: i64,
    pub training_completed_at: Option<i64>,
    pub parameters: Option<ModelParameters>,
    pub metrics: Option<EvaluationMetrics>,
    pub status: ModelStatus,
    pub is_production: bool,
    pub deployed_at: Option<i64>,
    pub trained_by: String,
    pub config: TrainingConfig,
    pub errors: Vec<RunError>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_type_round_trips_through_str() {
        for kind in InteractionType::ALL {
            assert_eq!(InteractionType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(InteractionType::parse("quiz"), None);
    }

    #[test]
    fn test_only_answers_are_critical() {
        assert!(InteractionType::Answer.is_critical());
        assert!(!InteractionType::PageView.is_critical());
    }

    #[test]
    fn test_average_difficulty() {
        let module = Module {
            id: "m".into(),
            title: String::new(),
            skill: "reading".into(),
            level: 1,
            items: vec![
                ModuleItem { item_id: None, title: None, difficulty: -1.0, discrimination: 1.0 },
                ModuleItem { item_id: None, title: None, difficulty: 1.0, discrimination: 1.0 },
            ],
        };
        assert_eq!(module.average_difficulty(), Some(0.0));

        let empty = Module { items: vec![], ..module };
        assert_eq!(empty.average_difficulty(), None);
    }

    #[test]
    fn test_only_completed_or_deployed_promotable() {
        assert!(ModelStatus::Completed.is_promotable());
        assert!(ModelStatus::Deployed.is_promotable());
        assert!(!ModelStatus::Archived.is_promotable());
        assert!(!ModelStatus::Failed.is_promotable());
        assert!(!ModelStatus::Training.is_promotable());
    }
}
