use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::profile::CandidateProfile;
use crate::scoring::engine::{ScoreResult, ScoringEngine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// 1-based.
    pub rank: usize,
    pub profile: CandidateProfile,
    pub score: ScoreResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedList {
    pub entries: Vec<RankedCandidate>,
}

impl RankedList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scores every profile independently, then orders them.
pub fn rank(profiles: Vec<CandidateProfile>, engine: &ScoringEngine) -> RankedList {
    let scored = profiles
        .into_iter()
        .map(|profile| {
            let score = engine.score(&profile);
            (profile, score)
        })
        .collect();
    order(scored)
}

/// Orders already-scored profiles: final score, then education, then
/// experience, all descending. The sort is stable, so remaining ties keep
/// the order of `scored`.
fn order(scored: Vec<(CandidateProfile, ScoreResult)>) -> RankedList {
    let mut scored = scored;
    scored.sort_by(|(_, a), (_, b)| compare(a, b));

    RankedList {
        entries: scored
            .into_iter()
            .enumerate()
            .map(|(i, (profile, score))| RankedCandidate {
                rank: i + 1,
                profile,
                score,
            })
            .collect(),
    }
}

fn compare(a: &ScoreResult, b: &ScoreResult) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.sub_scores.education.total_cmp(&a.sub_scores.education))
        .then_with(|| b.sub_scores.experience.total_cmp(&a.sub_scores.experience))
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::models::profile::{DegreeLevel, EducationRecord, ExperienceSummary};
    use crate::scoring::engine::{CriterionWeights, ScoringConfig};

    fn profile(id: &str, skills: &[&str], degree: DegreeLevel, years: f64) -> CandidateProfile {
        CandidateProfile {
            source_document_id: id.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            skill_evidence: BTreeMap::new(),
            education: vec![EducationRecord {
                institution: None,
                degree_level: degree,
                field: None,
            }],
            experience: ExperienceSummary {
                total_years: years,
                entries: Vec::new(),
            },
        }
    }

    fn engine(weights: CriterionWeights) -> ScoringEngine {
        ScoringEngine::new(ScoringConfig {
            weights,
            target_skills: ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            experience_cap_years: 10.0,
        })
        .unwrap()
    }

    fn ids(list: &RankedList) -> Vec<&str> {
        list.entries
            .iter()
            .map(|e| e.profile.source_document_id.as_str())
            .collect()
    }

    #[test]
    fn test_empty_input_gives_empty_list() {
        let list = rank(Vec::new(), &engine(CriterionWeights::default()));
        assert!(list.is_empty());
    }

    #[test]
    fn test_higher_skill_match_ranks_first() {
        let e = engine(CriterionWeights::default());
        let b = profile("b", &["A", "B", "C"], DegreeLevel::Bachelor, 2.0);
        let a = profile("a", &["A", "B", "C", "D"], DegreeLevel::Bachelor, 2.0);
        let list = rank(vec![b, a], &e);
        assert_eq!(ids(&list), vec!["a", "b"]);
        assert_eq!(list.entries[0].score.sub_scores.skills, 0.8);
        assert_eq!(list.entries[1].score.sub_scores.skills, 0.6);
        assert_eq!(list.entries[0].rank, 1);
        assert_eq!(list.entries[1].rank, 2);
    }

    #[test]
    fn test_equal_scores_keep_input_order() {
        let e = engine(CriterionWeights::default());
        let list = rank(
            vec![
                profile("first", &["A"], DegreeLevel::Master, 3.0),
                profile("second", &["B"], DegreeLevel::Master, 3.0),
                profile("third", &["C"], DegreeLevel::Master, 3.0),
            ],
            &e,
        );
        assert_eq!(ids(&list), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_education_breaks_final_score_ties() {
        // Skills-only weighting: equal finals, education decides.
        let e = engine(CriterionWeights {
            skills: 1.0,
            education: 0.0,
            experience: 0.0,
        });
        let list = rank(
            vec![
                profile("low", &["A"], DegreeLevel::Certificate, 9.0),
                profile("high", &["A"], DegreeLevel::Doctorate, 1.0),
            ],
            &e,
        );
        assert_eq!(ids(&list), vec!["high", "low"]);
    }

    #[test]
    fn test_experience_breaks_remaining_ties() {
        let e = engine(CriterionWeights {
            skills: 1.0,
            education: 0.0,
            experience: 0.0,
        });
        let list = rank(
            vec![
                profile("junior", &["A"], DegreeLevel::Bachelor, 1.0),
                profile("senior", &["A"], DegreeLevel::Bachelor, 8.0),
            ],
            &e,
        );
        assert_eq!(ids(&list), vec!["senior", "junior"]);
    }
}
