use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::errors::PipelineError;
use crate::extraction::extractor::round2;
use crate::extraction::vocabulary::Vocabulary;
use crate::models::entity::{EntityKind, ExperienceSpan, ExtractedEntity};
use crate::models::profile::{
    CandidateProfile, EducationRecord, ExperienceRecord, ExperienceSummary, SkillEvidence,
};

const DAYS_PER_YEAR: f64 = 365.25;

/// Folds extractor output into a single `CandidateProfile`.
pub struct ProfileBuilder<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> ProfileBuilder<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Builds a profile. Only a document with no entities of any kind fails;
    /// anything else yields a (possibly sparse) profile.
    pub fn build(
        &self,
        entities: &[ExtractedEntity],
        source_document_id: &str,
    ) -> Result<CandidateProfile, PipelineError> {
        if entities.is_empty() {
            return Err(PipelineError::InsufficientData);
        }

        let (skills, skill_evidence) = self.collect_skills(entities);
        let education = collect_education(entities);
        let experience = summarize_experience(entities);

        debug!(
            document_id = %source_document_id,
            skills = skills.len(),
            education = education.len(),
            experience_entries = experience.entries.len(),
            total_years = experience.total_years,
            "Profile built"
        );

        Ok(CandidateProfile {
            source_document_id: source_document_id.to_string(),
            skills,
            skill_evidence,
            education,
            experience,
        })
    }

    fn collect_skills(
        &self,
        entities: &[ExtractedEntity],
    ) -> (BTreeSet<String>, BTreeMap<String, SkillEvidence>) {
        let mut evidence: BTreeMap<String, SkillEvidence> = BTreeMap::new();

        for entity in entities.iter().filter(|e| e.is_skill()) {
            let canonical = self
                .vocabulary
                .resolve_skill(&entity.normalized_value)
                .unwrap_or(entity.normalized_value.trim())
                .to_string();
            if canonical.is_empty() {
                continue;
            }

            match evidence.get_mut(&canonical) {
                // Strictly greater: on equal confidence the first mention stays.
                Some(existing) if entity.confidence > existing.confidence => {
                    existing.raw_span = entity.raw_span.clone();
                    existing.confidence = entity.confidence;
                }
                Some(_) => {}
                None => {
                    evidence.insert(
                        canonical,
                        SkillEvidence {
                            raw_span: entity.raw_span.clone(),
                            confidence: entity.confidence,
                        },
                    );
                }
            }
        }

        let skills = evidence.keys().cloned().collect();
        (skills, evidence)
    }
}

/// Exact repeats dropped, then a stable sort with the highest degree first.
fn collect_education(entities: &[ExtractedEntity]) -> Vec<EducationRecord> {
    let mut records: Vec<EducationRecord> = Vec::new();
    for entity in entities {
        let EntityKind::EducationCredential(credential) = &entity.kind else {
            continue;
        };
        let record = EducationRecord {
            institution: credential.institution.clone(),
            degree_level: credential.degree_level,
            field: credential.field.clone(),
        };
        if !records.contains(&record) {
            records.push(record);
        }
    }
    records.sort_by(|a, b| b.degree_level.cmp(&a.degree_level));
    records
}

// ────────────────────────────────────────────────────────────────────────────
// Experience
// ────────────────────────────────────────────────────────────────────────────

/// Total years with overlap counted once.
///
/// Dated entries are walked in start order. Each one only counts the days
/// after the furthest end seen so far, so the earlier-starting entry keeps
/// any overlap and a fully contained entry counts zero. Undated claims
/// ("5 years of experience") count only when nothing is dated.
fn summarize_experience(entities: &[ExtractedEntity]) -> ExperienceSummary {
    let spans: Vec<&ExperienceSpan> = entities
        .iter()
        .filter_map(|e| match &e.kind {
            EntityKind::ExperienceEntry(span) => Some(span),
            _ => None,
        })
        .collect();

    let mut dated: Vec<(usize, &ExperienceSpan, NaiveDate, NaiveDate)> = spans
        .iter()
        .enumerate()
        .filter_map(|(i, span)| match (span.start, span.end) {
            (Some(start), Some(end)) if end >= start => Some((i, *span, start, end)),
            _ => None,
        })
        .collect();
    dated.sort_by(|a, b| a.2.cmp(&b.2).then(a.3.cmp(&b.3)).then(a.0.cmp(&b.0)));

    let mut entries = Vec::with_capacity(spans.len());
    let mut covered_until: Option<NaiveDate> = None;

    for (_, span, start, end) in &dated {
        let effective_start = match covered_until {
            Some(covered) if covered > *start => covered,
            _ => *start,
        };
        let counted_days = (*end - effective_start).num_days().max(0);
        covered_until = Some(covered_until.map_or(*end, |c| c.max(*end)));
        entries.push(record(span, round2(counted_days as f64 / DAYS_PER_YEAR)));
    }

    let undated: Vec<&ExperienceSpan> = spans.iter().copied().filter(|s| !s.is_dated()).collect();
    let counted_claim = if dated.is_empty() {
        undated
            .iter()
            .enumerate()
            .fold(None::<(usize, f64)>, |best, (i, span)| match best {
                Some((_, years)) if years >= span.duration_years => best,
                _ => Some((i, span.duration_years)),
            })
            .map(|(i, _)| i)
    } else {
        None
    };
    for (i, span) in undated.iter().enumerate() {
        let counted = if counted_claim == Some(i) {
            span.duration_years.max(0.0)
        } else {
            0.0
        };
        entries.push(record(span, counted));
    }

    let total_years = round2(entries.iter().map(|e| e.counted_years).sum());
    ExperienceSummary {
        total_years,
        entries,
    }
}

fn record(span: &ExperienceSpan, counted_years: f64) -> ExperienceRecord {
    ExperienceRecord {
        role: span.role.clone(),
        organization: span.organization.clone(),
        start: span.start,
        end: span.end,
        ongoing: span.ongoing,
        duration_years: span.duration_years,
        counted_years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::vocabulary::VocabularySettings;
    use crate::models::entity::EducationCredential;
    use crate::models::profile::DegreeLevel;

    fn vocabulary() -> Vocabulary {
        Vocabulary::from_settings(&VocabularySettings {
            skills: vec!["JavaScript".to_string(), "Python".to_string()],
            aliases: BTreeMap::from([("js".to_string(), "JavaScript".to_string())]),
            ..Default::default()
        })
        .unwrap()
    }

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn job(role: &str, start: NaiveDate, end: NaiveDate) -> ExtractedEntity {
        ExtractedEntity {
            kind: EntityKind::ExperienceEntry(ExperienceSpan {
                role: Some(role.to_string()),
                organization: None,
                start: Some(start),
                end: Some(end),
                ongoing: false,
                duration_years: round2((end - start).num_days() as f64 / DAYS_PER_YEAR),
            }),
            raw_span: role.to_string(),
            normalized_value: role.to_string(),
            confidence: 0.7,
        }
    }

    fn claim(years: f64) -> ExtractedEntity {
        ExtractedEntity {
            kind: EntityKind::ExperienceEntry(ExperienceSpan {
                role: None,
                organization: None,
                start: None,
                end: None,
                ongoing: false,
                duration_years: years,
            }),
            raw_span: format!("{years} years of experience"),
            normalized_value: "claimed experience".to_string(),
            confidence: 0.4,
        }
    }

    fn degree(level: DegreeLevel, institution: Option<&str>) -> ExtractedEntity {
        ExtractedEntity {
            kind: EntityKind::EducationCredential(EducationCredential {
                institution: institution.map(str::to_string),
                degree_level: level,
                field: None,
            }),
            raw_span: level.to_string(),
            normalized_value: level.to_string(),
            confidence: 0.75,
        }
    }

    #[test]
    fn test_no_entities_is_insufficient_data() {
        let vocab = vocabulary();
        let err = ProfileBuilder::new(&vocab).build(&[], "doc").unwrap_err();
        assert_eq!(err, PipelineError::InsufficientData);
    }

    #[test]
    fn test_aliases_collapse_to_one_skill_with_best_evidence() {
        let vocab = vocabulary();
        let entities = vec![
            ExtractedEntity::skill("JS", "js", 0.8),
            ExtractedEntity::skill("JavaScript", "JavaScript", 1.0),
            ExtractedEntity::skill("python", "Python", 1.0),
        ];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        assert_eq!(
            profile.skills.iter().cloned().collect::<Vec<_>>(),
            vec!["JavaScript", "Python"]
        );
        assert_eq!(profile.skill_evidence["JavaScript"].raw_span, "JavaScript");
        assert_eq!(profile.skill_evidence["JavaScript"].confidence, 1.0);
    }

    #[test]
    fn test_equal_confidence_keeps_first_evidence() {
        let vocab = vocabulary();
        let entities = vec![
            ExtractedEntity::skill("Python", "Python", 1.0),
            ExtractedEntity::skill("PYTHON", "Python", 1.0),
        ];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        assert_eq!(profile.skill_evidence["Python"].raw_span, "Python");
    }

    #[test]
    fn test_unknown_skill_kept_as_is() {
        let vocab = vocabulary();
        let entities = vec![ExtractedEntity::skill("Rust", "Rust", 1.0)];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        assert!(profile.skills.contains("Rust"));
    }

    #[test]
    fn test_skill_dedup_is_idempotent() {
        let vocab = vocabulary();
        let builder = ProfileBuilder::new(&vocab);
        let once = vec![
            ExtractedEntity::skill("JS", "js", 0.8),
            ExtractedEntity::skill("Python", "Python", 1.0),
        ];
        let twice: Vec<_> = once.iter().chain(once.iter()).cloned().collect();
        let a = builder.build(&once, "doc").unwrap();
        let b = builder.build(&twice, "doc").unwrap();
        assert_eq!(a.skills, b.skills);
        assert_eq!(a, builder.build(&once, "doc").unwrap());
    }

    #[test]
    fn test_education_dedup_and_order() {
        let vocab = vocabulary();
        let entities = vec![
            degree(DegreeLevel::Unknown, Some("Yaba College")),
            degree(DegreeLevel::Bachelor, Some("Unilag")),
            degree(DegreeLevel::Master, None),
            degree(DegreeLevel::Bachelor, Some("Unilag")),
        ];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        let levels: Vec<_> = profile.education.iter().map(|e| e.degree_level).collect();
        assert_eq!(
            levels,
            vec![DegreeLevel::Master, DegreeLevel::Bachelor, DegreeLevel::Unknown]
        );
        assert_eq!(profile.highest_degree(), DegreeLevel::Master);
    }

    #[test]
    fn test_no_education_means_none_level() {
        let vocab = vocabulary();
        let entities = vec![ExtractedEntity::skill("Python", "Python", 1.0)];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        assert_eq!(profile.highest_degree(), DegreeLevel::None);
        assert_eq!(profile.total_years(), 0.0);
    }

    #[test]
    fn test_overlap_is_counted_once() {
        let vocab = vocabulary();
        // 2018–2020 and 2019–2021 overlap for a year: three distinct years total.
        let entities = vec![
            job("Later", date(2019, 1), date(2021, 1)),
            job("Earlier", date(2018, 1), date(2020, 1)),
        ];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        let entries = &profile.experience.entries;
        assert_eq!(entries[0].role.as_deref(), Some("Earlier"));
        assert_eq!(entries[0].counted_years, entries[0].duration_years);
        assert_eq!(entries[1].role.as_deref(), Some("Later"));
        assert!((entries[1].counted_years - 1.0).abs() < 0.01);
        assert!((profile.total_years() - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_contained_interval_counts_zero() {
        let vocab = vocabulary();
        let entities = vec![
            job("Long", date(2015, 1), date(2020, 1)),
            job("Inside", date(2016, 1), date(2017, 1)),
        ];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        assert_eq!(profile.experience.entries[1].counted_years, 0.0);
        assert!((profile.total_years() - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_total_is_sum_of_counted_years() {
        let vocab = vocabulary();
        let entities = vec![
            job("A", date(2012, 3), date(2014, 9)),
            job("B", date(2014, 1), date(2016, 6)),
            job("C", date(2019, 2), date(2020, 11)),
        ];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        let sum: f64 = profile.experience.entries.iter().map(|e| e.counted_years).sum();
        assert!((profile.total_years() - sum).abs() < 1e-9);
    }

    #[test]
    fn test_claims_ignored_when_dated_entries_exist() {
        let vocab = vocabulary();
        let entities = vec![claim(10.0), job("A", date(2020, 1), date(2022, 1))];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        assert!((profile.total_years() - 2.0).abs() < 0.01);
        assert_eq!(profile.experience.entries.len(), 2);
        assert_eq!(profile.experience.entries[1].counted_years, 0.0);
    }

    #[test]
    fn test_largest_claim_counts_when_nothing_is_dated() {
        let vocab = vocabulary();
        let entities = vec![claim(3.0), claim(5.0), claim(5.0)];
        let profile = ProfileBuilder::new(&vocab).build(&entities, "doc").unwrap();
        let counted: Vec<_> = profile
            .experience
            .entries
            .iter()
            .map(|e| e.counted_years)
            .collect();
        assert_eq!(counted, vec![0.0, 5.0, 0.0]);
        assert_eq!(profile.total_years(), 5.0);
    }
}
