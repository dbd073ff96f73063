//! Scoring engine: deterministic weighted formula over three normalized sub-scores.
//!
//! final = w_skills × skills + w_education × education + w_experience × experience
//!
//! Weights are normalized to sum to 1 when the engine is built, so every score
//! lies in [0, 1]. Output holds no timestamps and only ordered collections:
//! the same profile and configuration always serialize to the same bytes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::PipelineError;
use crate::extraction::normalizer::fold_case;
use crate::extraction::vocabulary::Vocabulary;
use crate::models::profile::{CandidateProfile, DegreeLevel};

const STRONG_FIT: f64 = 0.8;
const MODERATE_FIT: f64 = 0.6;
const MAX_NAMED_GAPS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionWeights {
    pub skills: f64,
    pub education: f64,
    pub experience: f64,
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            skills: 0.5,
            education: 0.2,
            experience: 0.3,
        }
    }
}

impl CriterionWeights {
    fn sum(&self) -> f64 {
        self.skills + self.education + self.experience
    }
}

/// Scoring section of the pipeline settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: CriterionWeights,
    #[serde(default)]
    pub target_skills: BTreeSet<String>,
    #[serde(default = "default_experience_cap")]
    pub experience_cap_years: f64,
}

fn default_experience_cap() -> f64 {
    10.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CriterionWeights::default(),
            target_skills: BTreeSet::new(),
            experience_cap_years: default_experience_cap(),
        }
    }
}

impl ScoringConfig {
    /// Rewrites target skills to their canonical dictionary form ("js" → "JavaScript").
    /// Targets the dictionary doesn't know are kept verbatim; no resume can match them,
    /// so each one is logged.
    pub fn canonicalized(mut self, vocabulary: &Vocabulary) -> Self {
        self.target_skills = self
            .target_skills
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|target| match vocabulary.resolve_skill(target) {
                Some(canonical) => canonical.to_string(),
                None => {
                    warn!(target_skill = %target, "Target skill is not in the skill dictionary");
                    target.trim().to_string()
                }
            })
            .collect();
        self
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let w = &self.weights;
        for (name, value) in [
            ("skills", w.skills),
            ("education", w.education),
            ("experience", w.experience),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "weight '{name}' must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if w.sum() <= 0.0 {
            return Err(PipelineError::InvalidConfiguration(
                "at least one criterion weight must be positive".to_string(),
            ));
        }
        if !self.experience_cap_years.is_finite() || self.experience_cap_years <= 0.0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "experience_cap_years must be a finite number above zero (got {})",
                self.experience_cap_years
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Result models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Skills,
    Education,
    Experience,
}

impl Criterion {
    pub fn as_str(self) -> &'static str {
        match self {
            Criterion::Skills => "skills",
            Criterion::Education => "education",
            Criterion::Experience => "experience",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub skills: f64,
    pub education: f64,
    pub experience: f64,
}

/// One line of the explanation: sub_score × weight = contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionBreakdown {
    pub criterion: Criterion,
    pub configured_weight: f64,
    pub weight: f64,
    pub sub_score: f64,
    pub contribution: f64,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub final_score: f64,
    pub sub_scores: SubScores,
    /// Normalized weights actually applied.
    pub weights: CriterionWeights,
    pub breakdown: Vec<CriterionBreakdown>,
    pub formula: String,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendation: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// A validated scoring configuration, ready to score any number of profiles.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoringConfig,
    weights: CriterionWeights,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let total = config.weights.sum();
        let weights = CriterionWeights {
            skills: config.weights.skills / total,
            education: config.weights.education / total,
            experience: config.weights.experience / total,
        };
        Ok(Self { config, weights })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, profile: &CandidateProfile) -> ScoreResult {
        let mut warnings = Vec::new();

        let held: BTreeSet<String> = profile.skills.iter().map(|s| fold_case(s)).collect();
        let (matched_skills, missing_skills): (Vec<String>, Vec<String>) = self
            .config
            .target_skills
            .iter()
            .cloned()
            .partition(|t| held.contains(&fold_case(t)));

        let targets = self.config.target_skills.len();
        let skills = if targets == 0 {
            warnings.push("No target skills configured; skills score is 0".to_string());
            0.0
        } else {
            matched_skills.len() as f64 / targets as f64
        };

        let degree = profile.highest_degree();
        let education = degree
            .ordinal()
            .map(|o| o as f64 / DegreeLevel::max_ordinal() as f64)
            .unwrap_or(0.0);

        let years = profile.total_years();
        let cap = self.config.experience_cap_years;
        let experience = (years / cap).clamp(0.0, 1.0);

        let sub_scores = SubScores {
            skills: round4(skills),
            education: round4(education),
            experience: round4(experience),
        };

        let breakdown = vec![
            self.line(
                Criterion::Skills,
                self.config.weights.skills,
                self.weights.skills,
                sub_scores.skills,
                format!("{} of {} target skills matched", matched_skills.len(), targets),
            ),
            self.line(
                Criterion::Education,
                self.config.weights.education,
                self.weights.education,
                sub_scores.education,
                format!(
                    "highest degree: {degree} ({}/{})",
                    degree.ordinal().unwrap_or(0),
                    DegreeLevel::max_ordinal()
                ),
            ),
            self.line(
                Criterion::Experience,
                self.config.weights.experience,
                self.weights.experience,
                sub_scores.experience,
                format!("{years:.2} years against a {cap}-year cap"),
            ),
        ];

        let final_score = round4(
            breakdown
                .iter()
                .map(|b| b.weight * b.sub_score)
                .sum::<f64>()
                .clamp(0.0, 1.0),
        );

        let formula = format!(
            "final = {} = {final_score:.4}",
            breakdown
                .iter()
                .map(|b| format!("{:.4} × {}({:.4})", b.weight, b.criterion.as_str(), b.sub_score))
                .collect::<Vec<_>>()
                .join(" + ")
        );

        ScoreResult {
            recommendation: build_recommendation(final_score, &missing_skills),
            final_score,
            sub_scores,
            weights: self.weights,
            breakdown,
            formula,
            matched_skills,
            missing_skills,
            warnings,
        }
    }

    fn line(
        &self,
        criterion: Criterion,
        configured_weight: f64,
        weight: f64,
        sub_score: f64,
        detail: String,
    ) -> CriterionBreakdown {
        CriterionBreakdown {
            criterion,
            configured_weight,
            weight,
            sub_score,
            contribution: round4(weight * sub_score),
            detail,
        }
    }
}

/// Scores one profile against a configuration in a single call.
#[allow(dead_code)]
pub fn score(profile: &CandidateProfile, config: &ScoringConfig) -> Result<ScoreResult, PipelineError> {
    Ok(ScoringEngine::new(config.clone())?.score(profile))
}

fn build_recommendation(final_score: f64, missing: &[String]) -> String {
    let points = (final_score * 100.0).round() as u32;
    let gaps: Vec<&str> = missing.iter().take(MAX_NAMED_GAPS).map(String::as_str).collect();

    if final_score >= STRONG_FIT {
        format!("Strong fit ({points}/100). Shortlist.")
    } else if final_score >= MODERATE_FIT {
        if gaps.is_empty() {
            format!("Moderate fit ({points}/100). Worth a closer look.")
        } else {
            format!("Moderate fit ({points}/100). Missing: {}.", gaps.join(", "))
        }
    } else if gaps.is_empty() {
        format!("Low fit ({points}/100).")
    } else {
        format!("Low fit ({points}/100). Significant gaps: {}.", gaps.join(", "))
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
