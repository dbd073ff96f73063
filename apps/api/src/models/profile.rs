use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Degree levels on the ordinal scale used for comparison and scoring.
///
/// Declaration order is the sort order: `Unknown` sorts below everything so
/// resolved credentials always lead a profile's education list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeLevel {
    Unknown,
    None,
    Certificate,
    Bachelor,
    Master,
    Doctorate,
}

impl DegreeLevel {
    /// Position on the scale none(0) < certificate < bachelor < master < doctorate(4).
    /// `Unknown` has no ordinal.
    pub fn ordinal(self) -> Option<u8> {
        match self {
            DegreeLevel::Unknown => None,
            DegreeLevel::None => Some(0),
            DegreeLevel::Certificate => Some(1),
            DegreeLevel::Bachelor => Some(2),
            DegreeLevel::Master => Some(3),
            DegreeLevel::Doctorate => Some(4),
        }
    }

    pub fn max_ordinal() -> u8 {
        4
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DegreeLevel::Unknown => "unknown",
            DegreeLevel::None => "none",
            DegreeLevel::Certificate => "certificate",
            DegreeLevel::Bachelor => "bachelor",
            DegreeLevel::Master => "master",
            DegreeLevel::Doctorate => "doctorate",
        }
    }
}

impl std::fmt::Display for DegreeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a canonical skill was seen, kept for explanation text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEvidence {
    pub raw_span: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EducationRecord {
    pub institution: Option<String>,
    pub degree_level: DegreeLevel,
    pub field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub role: Option<String>,
    pub organization: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub ongoing: bool,
    pub duration_years: f64,
    /// Years this entry adds to `total_years` after overlap clipping.
    pub counted_years: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceSummary {
    pub total_years: f64,
    pub entries: Vec<ExperienceRecord>,
}

/// The canonical structured record of one candidate. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub source_document_id: String,
    pub skills: BTreeSet<String>,
    pub skill_evidence: BTreeMap<String, SkillEvidence>,
    /// Sorted by degree level, highest first.
    pub education: Vec<EducationRecord>,
    pub experience: ExperienceSummary,
}

impl CandidateProfile {
    /// The profile's highest credential; `None` level when no education was found.
    pub fn highest_degree(&self) -> DegreeLevel {
        self.education
            .first()
            .map(|e| e.degree_level)
            .unwrap_or(DegreeLevel::None)
    }

    pub fn total_years(&self) -> f64 {
        self.experience.total_years
    }
}
