//! Lexical vocabularies: skill dictionary, alias map, degree and institution terms.
//!
//! Loaded from configuration once per process, compiled into an immutable
//! `Vocabulary` and shared by reference (`Arc`) across every pipeline run.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::PipelineError;
use crate::extraction::normalizer::fold_case;
use crate::models::profile::DegreeLevel;

/// Vocabulary section of the pipeline settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularySettings {
    /// Canonical skill identifiers, written the way they should be displayed.
    #[serde(default)]
    pub skills: Vec<String>,
    /// alias → canonical skill (e.g. "js" → "JavaScript").
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    /// degree level → terms that name a credential of that level.
    #[serde(default)]
    pub degrees: BTreeMap<DegreeLevel, Vec<String>>,
    /// Words that signal a credential without naming its level ("degree", "graduated").
    #[serde(default)]
    pub unresolved_degree_markers: Vec<String>,
    /// Words that mark an institution name ("university", "polytechnic").
    #[serde(default)]
    pub institution_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillTerm {
    pub folded: String,
    pub canonical: String,
    pub is_alias: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegreeTerm {
    pub folded: String,
    pub level: DegreeLevel,
}

/// Compiled, read-only vocabulary.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    skill_terms: Vec<SkillTerm>,
    canonical_by_folded: HashMap<String, String>,
    degree_terms: Vec<DegreeTerm>,
    degree_markers: Vec<String>,
    institution_keywords: Vec<String>,
}

impl Vocabulary {
    pub fn from_settings(settings: &VocabularySettings) -> Result<Self, PipelineError> {
        let mut skill_terms = Vec::new();
        let mut canonical_by_folded: HashMap<String, String> = HashMap::new();

        for skill in &settings.skills {
            let canonical = skill.trim();
            if canonical.is_empty() {
                return Err(PipelineError::InvalidConfiguration(
                    "skill dictionary contains an empty entry".to_string(),
                ));
            }
            let folded = fold_case(canonical);
            if canonical_by_folded.contains_key(&folded) {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "skill '{canonical}' is listed twice"
                )));
            }
            canonical_by_folded.insert(folded.clone(), canonical.to_string());
            skill_terms.push(SkillTerm {
                folded,
                canonical: canonical.to_string(),
                is_alias: false,
            });
        }

        for (alias, target) in &settings.aliases {
            let alias_folded = fold_case(alias.trim());
            let canonical = canonical_by_folded
                .get(&fold_case(target.trim()))
                .cloned()
                .ok_or_else(|| {
                    PipelineError::InvalidConfiguration(format!(
                        "alias '{alias}' points to '{target}', which is not in the skill dictionary"
                    ))
                })?;
            if alias_folded.is_empty() {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "empty alias for '{target}'"
                )));
            }
            match canonical_by_folded.get(&alias_folded) {
                Some(existing) if *existing == canonical => continue,
                Some(existing) => {
                    return Err(PipelineError::InvalidConfiguration(format!(
                        "alias '{alias}' for '{canonical}' collides with skill '{existing}'"
                    )))
                }
                None => {}
            }
            canonical_by_folded.insert(alias_folded.clone(), canonical.clone());
            skill_terms.push(SkillTerm {
                folded: alias_folded,
                canonical,
                is_alias: true,
            });
        }

        let mut degree_terms = Vec::new();
        for (level, terms) in &settings.degrees {
            if level.ordinal().is_none() || *level == DegreeLevel::None {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "degree terms cannot map to level '{level}'"
                )));
            }
            degree_terms.extend(
                terms
                    .iter()
                    .map(|t| fold_case(t.trim()))
                    .filter(|t| !t.is_empty())
                    .map(|folded| DegreeTerm {
                        folded,
                        level: *level,
                    }),
            );
        }
        // Longest first so "master of business administration" wins over "master".
        degree_terms.sort_by(|a, b| b.folded.len().cmp(&a.folded.len()));

        if skill_terms.is_empty() {
            warn!("Skill dictionary is empty; no skills will be extracted");
        }
        if degree_terms.is_empty() {
            warn!("Degree vocabulary is empty; education will only resolve to 'unknown'");
        }

        Ok(Self {
            skill_terms,
            canonical_by_folded,
            degree_terms,
            degree_markers: fold_all(&settings.unresolved_degree_markers),
            institution_keywords: fold_all(&settings.institution_keywords),
        })
    }

    pub fn skill_terms(&self) -> &[SkillTerm] {
        &self.skill_terms
    }

    /// Resolves a skill name or alias (any case) to its canonical identifier.
    pub fn resolve_skill(&self, value: &str) -> Option<&str> {
        self.canonical_by_folded
            .get(&fold_case(value.trim()))
            .map(String::as_str)
    }

    pub fn degree_terms(&self) -> &[DegreeTerm] {
        &self.degree_terms
    }

    pub fn degree_markers(&self) -> &[String] {
        &self.degree_markers
    }

    pub fn institution_keywords(&self) -> &[String] {
        &self.institution_keywords
    }

    pub fn skill_count(&self) -> usize {
        self.skill_terms.iter().filter(|t| !t.is_alias).count()
    }

    pub fn alias_count(&self) -> usize {
        self.skill_terms.iter().filter(|t| t.is_alias).count()
    }
}

fn fold_all(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| fold_case(t.trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VocabularySettings {
        VocabularySettings {
            skills: vec!["JavaScript".to_string(), "Python".to_string()],
            aliases: BTreeMap::from([
                ("JS".to_string(), "JavaScript".to_string()),
                ("py".to_string(), "python".to_string()),
            ]),
            degrees: BTreeMap::from([
                (DegreeLevel::Bachelor, vec!["bachelor".to_string()]),
                (
                    DegreeLevel::Master,
                    vec!["master".to_string(), "master of business administration".to_string()],
                ),
            ]),
            unresolved_degree_markers: vec!["Degree".to_string()],
            institution_keywords: vec!["University".to_string()],
        }
    }

    #[test]
    fn test_resolves_canonical_and_alias_case_insensitively() {
        let vocab = Vocabulary::from_settings(&settings()).unwrap();
        assert_eq!(vocab.resolve_skill("javascript"), Some("JavaScript"));
        assert_eq!(vocab.resolve_skill("js"), Some("JavaScript"));
        assert_eq!(vocab.resolve_skill(" PY "), Some("Python"));
        assert_eq!(vocab.resolve_skill("rust"), None);
    }

    #[test]
    fn test_counts_skills_and_aliases() {
        let vocab = Vocabulary::from_settings(&settings()).unwrap();
        assert_eq!(vocab.skill_count(), 2);
        assert_eq!(vocab.alias_count(), 2);
    }

    #[test]
    fn test_alias_to_unknown_skill_is_rejected() {
        let mut s = settings();
        s.aliases.insert("golang".to_string(), "Go".to_string());
        let err = Vocabulary::from_settings(&s).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(msg) if msg.contains("golang")));
    }

    #[test]
    fn test_duplicate_skill_is_rejected() {
        let mut s = settings();
        s.skills.push("python".to_string());
        assert!(Vocabulary::from_settings(&s).is_err());
    }

    #[test]
    fn test_alias_colliding_with_other_skill_is_rejected() {
        let mut s = settings();
        s.aliases.insert("python".to_string(), "JavaScript".to_string());
        assert!(Vocabulary::from_settings(&s).is_err());
    }

    #[test]
    fn test_degree_terms_sorted_longest_first() {
        let vocab = Vocabulary::from_settings(&settings()).unwrap();
        assert_eq!(
            vocab.degree_terms()[0].folded,
            "master of business administration"
        );
    }

    #[test]
    fn test_degree_terms_cannot_map_to_unknown() {
        let mut s = settings();
        s.degrees
            .insert(DegreeLevel::Unknown, vec!["something".to_string()]);
        assert!(Vocabulary::from_settings(&s).is_err());
    }

    #[test]
    fn test_markers_and_keywords_are_folded() {
        let vocab = Vocabulary::from_settings(&settings()).unwrap();
        assert_eq!(vocab.degree_markers(), ["degree".to_string()]);
        assert_eq!(vocab.institution_keywords(), ["university".to_string()]);
    }

    #[test]
    fn test_empty_settings_are_allowed() {
        let vocab = Vocabulary::from_settings(&VocabularySettings::default()).unwrap();
        assert_eq!(vocab.skill_count(), 0);
    }
}
