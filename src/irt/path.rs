//! Module ranking and path sequencing against a learner's ability.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ability::{theta_to_level, ProficiencyLevel};
use super::types::Module;

pub const ZPD_OFFSET: f64 = 0.3;
pub const NEAR_TIE_MARGIN: f64 = 5.0;
pub const RANKED_PER_SKILL: usize = 5;
pub const SEQUENCED_PER_SKILL: usize = 3;
pub const ONBOARDING_THETA: f64 = -1.0;
pub const ONBOARDING_SKILL: &str = "reading";
pub const MINUTES_PER_ITEM: u32 = 5;
pub const EMPTY_MODULE_ITEM_ESTIMATE: u32 = 3;
pub const STUDY_HOURS_PER_WEEK: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedModule {
    #[serde(flatten)]
    pub module: Module,
    pub fit_score: f64,
    pub level_gap: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathModule {
    #[serde(flatten)]
    pub module: Module,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit_score: Option<f64>,
    pub priority: Priority,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub frequency: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticCheckpoint {
    pub recommended: bool,
    pub frequency: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentSchedule {
    pub diagnostic: DiagnosticCheckpoint,
    pub formative: Checkpoint,
    pub summative: Checkpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusArea {
    pub skill: String,
    pub topic: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DurationEstimate {
    pub total_minutes: u32,
    pub hours: u32,
    pub weeks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub focus_areas: Vec<FocusArea>,
    pub estimated_duration: DurationEstimate,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PathPlan {
    pub user_theta: f64,
    pub suggested_level: u8,
    pub suggested_level_name: ProficiencyLevel,
    pub modules: Vec<PathModule>,
    pub path_by_skill: BTreeMap<String, Vec<RankedModule>>,
    pub assessment_schedule: AssessmentSchedule,
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyCatalog;

/// `100 · exp(-|avg_difficulty - (θ + 0.3)|)`; modules without items score 0.
pub fn module_fit_score(module: &Module, theta: f64) -> f64 {
    match module.average_difficulty() {
        Some(avg) => fit_score_for_difficulty(avg, theta),
        None => 0.0,
    }
}

pub fn fit_score_for_difficulty(avg_difficulty: f64, theta: f64) -> f64 {
    let ideal = theta + ZPD_OFFSET;
    100.0 * (-(avg_difficulty - ideal).abs()).exp()
}

fn compare_ranked(a: &RankedModule, b: &RankedModule) -> Ordering {
    if (a.fit_score - b.fit_score).abs() > NEAR_TIE_MARGIN {
        b.fit_score.total_cmp(&a.fit_score)
    } else {
        a.level_gap.cmp(&b.level_gap)
    }
}

/// Near-tie comparison is not transitive, so ordering is done with a stable
/// insertion pass over an id-sorted input instead of `sort_by`.
fn rank_in_place(ranked: &mut [RankedModule]) {
    for i in 1..ranked.len() {
        let mut j = i;
        while j > 0 && compare_ranked(&ranked[j], &ranked[j - 1]) == Ordering::Less {
            ranked.swap(j, j - 1);
            j -= 1;
        }
    }
}

pub fn rank_skill_modules(catalog: &[Module], theta: f64, skill: &str) -> Vec<RankedModule> {
    let target_level = i64::from(theta_to_level(theta).index());
    let mut ranked: Vec<RankedModule> = catalog
        .iter()
        .filter(|module| module.skill == skill)
        .map(|module| RankedModule {
            fit_score: module_fit_score(module, theta),
            level_gap: (i64::from(module.level) - target_level).unsigned_abs() as u32,
            module: module.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| a.module.id.cmp(&b.module.id));
    rank_in_place(&mut ranked);
    ranked.truncate(RANKED_PER_SKILL);
    ranked
}

pub fn generate_path(
    theta: f64,
    catalog: &[Module],
    target_skills: &[String],
    include_onboarding: bool,
) -> Result<PathPlan, EmptyCatalog> {
    if catalog.is_empty() {
        return Err(EmptyCatalog);
    }

    let path_by_skill: BTreeMap<String, Vec<RankedModule>> = target_skills
        .iter()
        .map(|skill| (skill.clone(), rank_skill_modules(catalog, theta, skill)))
        .collect();

    let mut modules = Vec::new();

    let onboarding = if include_onboarding && theta < ONBOARDING_THETA {
        onboarding_module(catalog)
    } else {
        None
    };
    if let Some(module) = onboarding {
        modules.push(PathModule {
            module: module.clone(),
            fit_score: None,
            priority: Priority::High,
            reason: "Onboarding & Diagnostic".to_string(),
        });
    }

    for rank in 0..SEQUENCED_PER_SKILL {
        for skill in target_skills {
            let Some(candidate) = path_by_skill.get(skill).and_then(|list| list.get(rank)) else {
                continue;
            };
            if onboarding.is_some_and(|m| m.id == candidate.module.id) {
                continue;
            }
            let (priority, reason) = if rank == 0 {
                (Priority::High, "Best fit for current level")
            } else {
                (Priority::Medium, "Skill development")
            };
            modules.push(PathModule {
                module: candidate.module.clone(),
                fit_score: Some(candidate.fit_score),
                priority,
                reason: reason.to_string(),
            });
        }
    }

    let level = theta_to_level(theta);
    let estimated_duration = estimate_duration(&modules);

    Ok(PathPlan {
        user_theta: theta,
        suggested_level: level.index(),
        suggested_level_name: level,
        modules,
        path_by_skill,
        assessment_schedule: assessment_schedule(theta),
        recommendations: Recommendations {
            focus_areas: focus_areas(theta),
            estimated_duration,
            next_steps: next_steps(theta),
        },
    })
}

fn onboarding_module(catalog: &[Module]) -> Option<&Module> {
    catalog
        .iter()
        .filter(|module| module.level == 0 && module.skill == ONBOARDING_SKILL)
        .min_by(|a, b| a.id.cmp(&b.id))
}

pub fn assessment_schedule(theta: f64) -> AssessmentSchedule {
    let level = theta_to_level(theta);
    let formative = if level <= ProficiencyLevel::Elementary {
        "every 3 modules"
    } else {
        "every 5 modules"
    };

    AssessmentSchedule {
        diagnostic: DiagnosticCheckpoint {
            recommended: level <= ProficiencyLevel::Foundations,
            frequency: "once".to_string(),
            purpose: "Establish baseline ability".to_string(),
        },
        formative: Checkpoint {
            frequency: formative.to_string(),
            purpose: "Track ongoing progress and adjust path".to_string(),
        },
        summative: Checkpoint {
            frequency: "every 2 weeks".to_string(),
            purpose: "Validate skill mastery".to_string(),
        },
    }
}

pub fn focus_areas(theta: f64) -> Vec<FocusArea> {
    let table: [(&str, &str, Priority); 2] = if theta < 0.0 {
        [
            ("reading", "Basic vocabulary and comprehension", Priority::High),
            ("listening", "Simple conversations and instructions", Priority::High),
        ]
    } else if theta < 1.0 {
        [
            ("writing", "Sentence structure and grammar", Priority::Medium),
            ("speaking", "Pronunciation and basic dialogue", Priority::Medium),
        ]
    } else {
        [
            ("reading", "Complex texts and inference", Priority::Medium),
            ("writing", "Essay structure and argumentation", Priority::High),
        ]
    };

    table
        .into_iter()
        .map(|(skill, topic, priority)| FocusArea {
            skill: skill.to_string(),
            topic: topic.to_string(),
            priority,
        })
        .collect()
}

pub fn next_steps(theta: f64) -> Vec<String> {
    let steps: [&str; 3] = match theta_to_level(theta) {
        ProficiencyLevel::Diagnostic => [
            "Complete diagnostic assessment to establish your baseline",
            "Start with foundational reading modules",
            "Practice daily for 15-20 minutes",
        ],
        ProficiencyLevel::Foundations | ProficiencyLevel::Elementary => [
            "Focus on building core vocabulary and grammar",
            "Complete 2-3 modules per week",
            "Review challenging topics using spaced repetition",
        ],
        _ => [
            "Tackle intermediate and advanced materials",
            "Focus on writing and speaking skills",
            "Engage with authentic content (articles, videos)",
        ],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

pub fn estimate_duration(modules: &[PathModule]) -> DurationEstimate {
    let total_minutes: u32 = modules
        .iter()
        .map(|entry| {
            let count = match entry.module.items.len() {
                0 => EMPTY_MODULE_ITEM_ESTIMATE,
                n => n as u32,
            };
            count * MINUTES_PER_ITEM
        })
        .sum();

    let minutes_per_week = STUDY_HOURS_PER_WEEK * 60;
    DurationEstimate {
        total_minutes,
        hours: (f64::from(total_minutes) / 60.0).round() as u32,
        weeks: total_minutes.div_ceil(minutes_per_week),
    }
}

/// Success rates per skill over a recent response window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_responses: usize,
    pub avg_correctness: f64,
    pub skill_rates: BTreeMap<String, f64>,
    pub weak_skills: Vec<String>,
}

/// `responses` are `(skill, correct)`; untagged responses only count toward the overall rate.
pub fn analyze_performance(responses: &[(Option<String>, bool)], weak_threshold: f64) -> PerformanceSummary {
    if responses.is_empty() {
        return PerformanceSummary::default();
    }

    let correct = responses.iter().filter(|(_, ok)| *ok).count();
    let mut per_skill: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for (skill, ok) in responses {
        if let Some(skill) = skill {
            let entry = per_skill.entry(skill.clone()).or_default();
            entry.0 += 1;
            if *ok {
                entry.1 += 1;
            }
        }
    }

    let skill_rates: BTreeMap<String, f64> = per_skill
        .into_iter()
        .map(|(skill, (attempts, correct))| (skill, correct as f64 / attempts as f64))
        .collect();
    let weak_skills = skill_rates
        .iter()
        .filter(|(_, rate)| **rate < weak_threshold)
        .map(|(skill, _)| skill.clone())
        .collect();

    PerformanceSummary {
        total_responses: responses.len(),
        avg_correctness: correct as f64 / responses.len() as f64,
        skill_rates,
        weak_skills,
    }
}
