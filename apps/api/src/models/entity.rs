use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::profile::DegreeLevel;

/// Structured payload of an education mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationCredential {
    pub institution: Option<String>,
    pub degree_level: DegreeLevel,
    pub field: Option<String>,
}

/// Structured payload of an experience mention.
///
/// Dated entries come from a detected date range; undated ones from a claim
/// such as "5 years of experience" and carry only `duration_years`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceSpan {
    pub role: Option<String>,
    pub organization: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// True when the range was open-ended ("present") and `end` is the processing date.
    pub ongoing: bool,
    pub duration_years: f64,
}

impl ExperienceSpan {
    pub fn is_dated(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityKind {
    Skill,
    EducationCredential(EducationCredential),
    ExperienceEntry(ExperienceSpan),
}

/// A tagged mention found by the extractor.
///
/// `normalized_value` is the canonical skill for skills, the degree level for
/// education and the role (or "experience") for experience entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    #[serde(flatten)]
    pub kind: EntityKind,
    pub raw_span: String,
    pub normalized_value: String,
    /// Advisory, 0.0 – 1.0. Never gates inclusion.
    pub confidence: f32,
}

impl ExtractedEntity {
    pub fn skill(raw_span: impl Into<String>, canonical: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind: EntityKind::Skill,
            raw_span: raw_span.into(),
            normalized_value: canonical.into(),
            confidence,
        }
    }

    pub fn is_skill(&self) -> bool {
        matches!(self.kind, EntityKind::Skill)
    }
}
