//! Entity extractor: dictionary and pattern scans over normalized text units.
//!
//! Three independent scans, concatenated in order skills → education → experience:
//! 1. Skills: word-bounded lookup of every dictionary term and alias, one entity
//!    per canonical skill per document (exact 1.0 > alias 0.8).
//! 2. Education: degree terms, unresolved degree markers and institution keywords
//!    per unit; one entity per (degree, institution) pair.
//! 3. Experience: date ranges plus role/organization on the same unit (or the
//!    label-only unit right above it), and "N years of experience" claims.
//!
//! No scan fails: unmatched text simply yields fewer entities.

use std::collections::HashMap;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::extraction::normalizer::{fold_case, NormalizedText, TextUnit};
use crate::extraction::vocabulary::Vocabulary;
use crate::models::entity::{EducationCredential, EntityKind, ExperienceSpan, ExtractedEntity};
use crate::models::profile::DegreeLevel;

pub const EXACT_MATCH_CONFIDENCE: f32 = 1.0;
pub const ALIAS_MATCH_CONFIDENCE: f32 = 0.8;

const EDUCATION_PAIR_CONFIDENCE: f32 = 0.9;
const EDUCATION_DEGREE_ONLY_CONFIDENCE: f32 = 0.75;
const EDUCATION_UNRESOLVED_CONFIDENCE: f32 = 0.4;

const EXPERIENCE_ROLE_AND_ORG_CONFIDENCE: f32 = 0.9;
const EXPERIENCE_ROLE_ONLY_CONFIDENCE: f32 = 0.7;
const EXPERIENCE_BARE_CONFIDENCE: f32 = 0.5;
const CLAIMED_EXPERIENCE_CONFIDENCE: f32 = 0.4;

const MAX_FIELD_CHARS: usize = 60;
const DAYS_PER_YEAR: f64 = 365.25;

const MONTH: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

lazy_static! {
    // Matched against folded (lower-case) text only.
    static ref DATE_RANGE: Regex = Regex::new(&format!(
        r"\b(?:(?P<sm>{MONTH})\.?\s+|(?P<smn>0?[1-9]|1[0-2])[/.])?(?P<sy>(?:19|20)\d{{2}})\s*(?:-|to|until|till)\s*(?:(?:(?P<em>{MONTH})\.?\s+|(?P<emn>0?[1-9]|1[0-2])[/.])?(?P<ey>(?:19|20)\d{{2}})\b|(?P<open>present|current(?:ly)?|now|today|date)\b)"
    ))
    .expect("date range pattern is valid");
    static ref YEAR: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").expect("year pattern is valid");
    static ref CLAIMED_YEARS: Regex = Regex::new(
        r"\b(?P<n>\d{1,2}(?:\.\d)?)\s*\+?\s*(?:years?|yrs?)\b(?:\s+of)?(?:\s+(?:professional|work|working|industry|relevant|hands-on))?\s+experience\b"
    )
    .expect("claimed experience pattern is valid");
}

/// Scans normalized text against a shared vocabulary.
///
/// `as_of` is the processing date that open-ended ranges ("present") resolve to.
/// It is an input, never read from the clock here, so extraction stays pure.
pub struct EntityExtractor<'a> {
    vocabulary: &'a Vocabulary,
    as_of: NaiveDate,
}

impl<'a> EntityExtractor<'a> {
    pub fn new(vocabulary: &'a Vocabulary, as_of: NaiveDate) -> Self {
        Self { vocabulary, as_of }
    }

    pub fn extract(&self, text: &NormalizedText) -> Vec<ExtractedEntity> {
        let mut entities = self.scan_skills(text);
        entities.extend(self.scan_education(text));
        entities.extend(self.scan_experience(text));
        entities
    }

    // ────────────────────────────────────────────────────────────────────────
    // Skill scan
    // ────────────────────────────────────────────────────────────────────────

    pub fn scan_skills(&self, text: &NormalizedText) -> Vec<ExtractedEntity> {
        let mut entities: Vec<ExtractedEntity> = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for unit in text.units() {
            for term in self.vocabulary.skill_terms() {
                let Some(start) = find_term(&unit.folded, &term.folded) else {
                    continue;
                };
                let confidence = if term.is_alias {
                    ALIAS_MATCH_CONFIDENCE
                } else {
                    EXACT_MATCH_CONFIDENCE
                };
                let span = unit.display_span(start, start + term.folded.len());

                match seen.get(term.canonical.as_str()) {
                    Some(&idx) => {
                        // Keep the first mention unless a stronger match shows up later.
                        if confidence > entities[idx].confidence {
                            entities[idx].confidence = confidence;
                            entities[idx].raw_span = span.to_string();
                        }
                    }
                    None => {
                        seen.insert(term.canonical.as_str(), entities.len());
                        entities.push(ExtractedEntity::skill(span, &term.canonical, confidence));
                    }
                }
            }
        }

        entities
    }

    // ────────────────────────────────────────────────────────────────────────
    // Education scan
    // ────────────────────────────────────────────────────────────────────────

    pub fn scan_education(&self, text: &NormalizedText) -> Vec<ExtractedEntity> {
        text.units()
            .iter()
            .flat_map(|unit| self.education_in_unit(unit))
            .collect()
    }

    fn education_in_unit(&self, unit: &TextUnit) -> Vec<ExtractedEntity> {
        let degrees = self.find_degrees(&unit.folded);
        let has_marker = self
            .vocabulary
            .degree_markers()
            .iter()
            .any(|m| find_term(&unit.folded, m).is_some());
        let institution = self.find_institution(unit, &degrees);

        if degrees.is_empty() && !has_marker && institution.is_none() {
            return Vec::new();
        }
        // A school named as an employer, or a title like "Graduate Trainee", is not a credential.
        if degrees.is_empty() && self.is_employment_unit(unit) {
            return Vec::new();
        }

        let segments = segments(&unit.folded);

        if degrees.is_empty() {
            let field = self.find_field(unit, &segments, None, institution.as_ref());
            return vec![education_entity(
                unit,
                EducationCredential {
                    institution: institution.map(|i| i.name),
                    degree_level: DegreeLevel::Unknown,
                    field,
                },
                EDUCATION_UNRESOLVED_CONFIDENCE,
            )];
        }

        degrees
            .iter()
            .map(|degree| {
                let field = self.find_field(unit, &segments, Some(degree), institution.as_ref());
                let confidence = if institution.is_some() {
                    EDUCATION_PAIR_CONFIDENCE
                } else {
                    EDUCATION_DEGREE_ONLY_CONFIDENCE
                };
                education_entity(
                    unit,
                    EducationCredential {
                        institution: institution.as_ref().map(|i| i.name.clone()),
                        degree_level: degree.level,
                        field,
                    },
                    confidence,
                )
            })
            .collect()
    }

    /// Degree terms in a unit, longest first, without overlaps and one per level.
    fn find_degrees(&self, folded: &str) -> Vec<DegreeMatch> {
        let mut found: Vec<DegreeMatch> = Vec::new();
        for term in self.vocabulary.degree_terms() {
            let Some(start) = find_term(folded, &term.folded) else {
                continue;
            };
            let end = start + term.folded.len();
            let overlaps = found.iter().any(|d| start < d.end && d.start < end);
            let same_level = found.iter().any(|d| d.level == term.level);
            if !overlaps && !same_level {
                found.push(DegreeMatch {
                    start,
                    end,
                    level: term.level,
                });
            }
        }
        found.sort_by_key(|d| d.start);
        found
    }

    fn find_institution(&self, unit: &TextUnit, degrees: &[DegreeMatch]) -> Option<InstitutionMatch> {
        let folded = &unit.folded;
        for (seg_start, seg_end) in segments(folded) {
            let segment = &folded[seg_start..seg_end];
            let Some(keyword_at) = self
                .vocabulary
                .institution_keywords()
                .iter()
                .filter_map(|k| find_term(segment, k))
                .min()
            else {
                continue;
            };

            // Skip a leading "B.Sc. from" / "studied at" prefix inside the segment.
            let mut start = connector_end(&segment[..keyword_at]).unwrap_or(0);
            for degree in degrees {
                if degree.start >= seg_start && degree.end <= seg_start + keyword_at {
                    start = start.max(degree.end - seg_start);
                }
            }
            let end = cut_at_dates(segment, start);
            let name = trim_label(unit.display_span(seg_start + start, seg_start + end));
            if !name.is_empty() {
                return Some(InstitutionMatch {
                    name: name.to_string(),
                    seg_start,
                    seg_end,
                });
            }
        }
        None
    }

    /// Field of study: "... in <field>" after the degree term, otherwise the first
    /// other short, digit-free segment of the unit.
    fn find_field(
        &self,
        unit: &TextUnit,
        segments: &[(usize, usize)],
        degree: Option<&DegreeMatch>,
        institution: Option<&InstitutionMatch>,
    ) -> Option<String> {
        let folded = &unit.folded;
        let anchor = match degree {
            Some(d) => Some(d.end),
            None => self
                .vocabulary
                .degree_markers()
                .iter()
                .filter_map(|m| find_term(folded, m).map(|s| s + m.len()))
                .min(),
        };

        if let Some(anchor) = anchor {
            let seg_end = segments
                .iter()
                .find(|&&(s, e)| s <= anchor && anchor <= e)
                .map(|&(_, e)| e)
                .unwrap_or(folded.len());
            if let Some(rel) = folded[anchor..seg_end].find(" in ") {
                let start = anchor + rel + " in ".len();
                let mut end = seg_end;
                if let Some(cut) = connector_start(&folded[start..end]) {
                    end = start + cut;
                }
                end = start + cut_at_dates(&folded[start..end], 0);
                let field = trim_label(unit.display_span(start, end));
                if !field.is_empty() {
                    return Some(field.to_string());
                }
            }
        }

        segments
            .iter()
            .filter(|&&(s, e)| {
                let in_degree = degree.map(|d| s <= d.start && d.end <= e).unwrap_or(false);
                let in_marker = anchor.map(|a| s < a && a <= e).unwrap_or(false);
                let is_institution = institution
                    .map(|i| i.seg_start == s && i.seg_end == e)
                    .unwrap_or(false);
                !in_degree && !in_marker && !is_institution
            })
            .map(|&(s, e)| unit.display_span(s, e))
            .find(|seg| {
                seg.chars().any(char::is_alphabetic)
                    && !seg.chars().any(|c| c.is_ascii_digit())
                    && seg.chars().count() <= MAX_FIELD_CHARS
            })
            .map(|seg| trim_label(seg).to_string())
            .filter(|f| !f.is_empty())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Experience scan
    // ────────────────────────────────────────────────────────────────────────

    pub fn scan_experience(&self, text: &NormalizedText) -> Vec<ExtractedEntity> {
        let units = text.units();
        let mut entities = Vec::new();

        for (i, unit) in units.iter().enumerate() {
            if !self.is_education_unit(unit) {
                let mut label_from = 0;
                for caps in DATE_RANGE.captures_iter(&unit.folded) {
                    let Some(whole) = caps.get(0) else { continue };
                    let mut label = trim_label(unit.display_span(label_from, whole.start()));
                    if label.is_empty() && label_from == 0 {
                        label = trim_label(&unit.display[whole.end()..]);
                    }
                    if label.is_empty() && label_from == 0 && i > 0 {
                        let previous = &units[i - 1];
                        if self.is_label_only_unit(previous) {
                            label = trim_label(&previous.display);
                        }
                    }
                    label_from = whole.end();

                    if let Some(entity) = self.experience_entity(unit, &caps, label) {
                        entities.push(entity);
                    }
                }
            }

            for caps in CLAIMED_YEARS.captures_iter(&unit.folded) {
                let Some(years) = caps.name("n").and_then(|n| n.as_str().parse::<f64>().ok()) else {
                    continue;
                };
                let Some(whole) = caps.get(0) else { continue };
                entities.push(ExtractedEntity {
                    kind: EntityKind::ExperienceEntry(ExperienceSpan {
                        role: None,
                        organization: None,
                        start: None,
                        end: None,
                        ongoing: false,
                        duration_years: years,
                    }),
                    raw_span: unit.display_span(whole.start(), whole.end()).to_string(),
                    normalized_value: "claimed experience".to_string(),
                    confidence: CLAIMED_EXPERIENCE_CONFIDENCE,
                });
            }
        }

        entities
    }

    /// Education units never contribute experience, so "B.Sc., 2014 - 2018" is
    /// not counted as four years of work. A degree term always makes a unit
    /// education; a marker or institution keyword does so only outside job lines.
    fn is_education_unit(&self, unit: &TextUnit) -> bool {
        let folded = &unit.folded;
        if self.has_degree_term(folded) {
            return true;
        }
        let has_marker = self
            .vocabulary
            .degree_markers()
            .iter()
            .any(|m| find_term(folded, m).is_some());
        (has_marker || self.names_institution(folded)) && !self.is_employment_unit(unit)
    }

    /// A job line without a degree term: "Role at Org", or a dated "Role, Org" /
    /// "Role | Org" whose role part names no school unless the organization does
    /// too. "Lecturer, University of Lagos, 2019 - 2021" is a job;
    /// "University of Lagos, Lagos, 2014 - 2018" is not.
    fn is_employment_unit(&self, unit: &TextUnit) -> bool {
        if self.has_degree_term(&unit.folded) {
            return false;
        }
        if is_employment_phrase(&unit.folded) {
            return true;
        }
        let Some(range) = DATE_RANGE.find(&unit.folded) else {
            return false;
        };
        let mut label = trim_label(unit.display_span(0, range.start()));
        if label.is_empty() {
            label = trim_label(&unit.display[range.end()..]);
        }
        match split_role_and_organization(label) {
            (Some(role), Some(organization)) => {
                self.names_institution(&fold_case(&organization)) || !self.names_institution(&fold_case(&role))
            }
            _ => false,
        }
    }

    /// Whether a unit can label the bare date range below it. Date lines,
    /// education lines, skill lists and headings ("Experience:") cannot.
    fn is_label_only_unit(&self, unit: &TextUnit) -> bool {
        let has_skill = self
            .vocabulary
            .skill_terms()
            .iter()
            .any(|t| find_term(&unit.folded, &t.folded).is_some());
        !DATE_RANGE.is_match(&unit.folded)
            && !unit.display.trim_end().ends_with(':')
            && !has_skill
            && !self.is_education_unit(unit)
    }

    fn has_degree_term(&self, folded: &str) -> bool {
        self.vocabulary
            .degree_terms()
            .iter()
            .any(|t| find_term(folded, &t.folded).is_some())
    }

    fn names_institution(&self, folded: &str) -> bool {
        self.vocabulary
            .institution_keywords()
            .iter()
            .any(|k| find_term(folded, k).is_some())
    }

    fn experience_entity(
        &self,
        unit: &TextUnit,
        caps: &Captures<'_>,
        label: &str,
    ) -> Option<ExtractedEntity> {
        let start = range_start(caps)?;
        let ongoing = caps.name("open").is_some();
        let end = if ongoing {
            self.as_of
        } else {
            range_end(caps)?.min(self.as_of)
        };
        if start > self.as_of || end < start {
            return None;
        }

        let (role, organization) = split_role_and_organization(label);
        let confidence = match (&role, &organization) {
            (Some(_), Some(_)) => EXPERIENCE_ROLE_AND_ORG_CONFIDENCE,
            (Some(_), None) => EXPERIENCE_ROLE_ONLY_CONFIDENCE,
            _ => EXPERIENCE_BARE_CONFIDENCE,
        };

        Some(ExtractedEntity {
            normalized_value: role.clone().unwrap_or_else(|| "experience".to_string()),
            kind: EntityKind::ExperienceEntry(ExperienceSpan {
                role,
                organization,
                start: Some(start),
                end: Some(end),
                ongoing,
                duration_years: years_between(start, end),
            }),
            raw_span: unit.display.clone(),
            confidence,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matching helpers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DegreeMatch {
    start: usize,
    end: usize,
    level: DegreeLevel,
}

#[derive(Debug, Clone)]
struct InstitutionMatch {
    name: String,
    seg_start: usize,
    seg_end: usize,
}

fn education_entity(
    unit: &TextUnit,
    credential: EducationCredential,
    confidence: f32,
) -> ExtractedEntity {
    ExtractedEntity {
        normalized_value: credential.degree_level.as_str().to_string(),
        kind: EntityKind::EducationCredential(credential),
        raw_span: unit.display.clone(),
        confidence,
    }
}

/// First word-bounded occurrence of `term` in `haystack`, both already folded.
///
/// Bounds treat `+`, `#` and a dot followed by a letter as part of a word, so
/// "java" misses "javascript", "c" misses "c++" and "js" misses "node.js".
pub fn find_term(haystack: &str, term: &str) -> Option<usize> {
    if term.is_empty() {
        return None;
    }
    haystack
        .match_indices(term)
        .map(|(start, _)| start)
        .find(|&start| boundary_before(haystack, start) && boundary_after(haystack, start + term.len()))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '+' || c == '#'
}

fn boundary_before(haystack: &str, start: usize) -> bool {
    match haystack[..start].chars().next_back() {
        None => true,
        Some(c) => !is_word_char(c) && c != '.',
    }
}

fn boundary_after(haystack: &str, end: usize) -> bool {
    let mut rest = haystack[end..].chars();
    match rest.next() {
        None => true,
        Some('.') => !rest.next().map(char::is_alphanumeric).unwrap_or(false),
        Some(c) => !is_word_char(c),
    }
}

/// Byte ranges of the comma / pipe / semicolon / parenthesis / " - " separated
/// segments of a unit, trimmed. Separators are ASCII, so ranges are valid in
/// both the folded and the display copy.
fn segments(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let sep_len = match bytes[i] {
            b',' | b'|' | b';' | b'(' | b')' => 1,
            b' ' if bytes[i + 1..].starts_with(b"- ") => 3,
            _ => 0,
        };
        if sep_len > 0 {
            push_trimmed(text, start, i, &mut out);
            i += sep_len;
            start = i;
        } else {
            i += 1;
        }
    }
    push_trimmed(text, start, text.len(), &mut out);
    out
}

fn push_trimmed(text: &str, start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
    let slice = &text[start..end];
    let trimmed = slice.trim();
    if !trimmed.is_empty() {
        let lead = slice.len() - slice.trim_start().len();
        out.push((start + lead, start + lead + trimmed.len()));
    }
}

const CONNECTORS: [&str; 3] = [" at ", " from ", " @ "];

/// End of the last "at"/"from"/"@" connector in `text`, if any.
fn connector_end(text: &str) -> Option<usize> {
    CONNECTORS
        .iter()
        .filter_map(|c| text.rfind(*c).map(|i| i + c.len()))
        .max()
}

/// Start of the first connector in `text`, if any.
fn connector_start(text: &str) -> Option<usize> {
    CONNECTORS.iter().filter_map(|c| text.find(*c)).min()
}

fn is_employment_phrase(folded: &str) -> bool {
    folded.contains(" at ") || folded.contains('@')
}

/// Offset (relative to `text`) where a date range or bare year begins at or after `from`.
fn cut_at_dates(text: &str, from: usize) -> usize {
    let tail = &text[from..];
    let range = DATE_RANGE.find(tail).map(|m| m.start());
    let year = YEAR.find(tail).map(|m| m.start());
    let cut = match (range, year) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => tail.len(),
    };
    from + cut
}

fn trim_label(text: &str) -> &str {
    text.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | '|' | ';' | ':' | '-' | '(' | ')' | '@' | '.')
    })
}

/// "Role at Org", "Role @ Org", "Role, Org", "Role | Org", "Role - Org", or just "Role".
fn split_role_and_organization(label: &str) -> (Option<String>, Option<String>) {
    if label.is_empty() {
        return (None, None);
    }
    let folded = fold_case(label);

    let split = [" at ", " @ ", "@"]
        .iter()
        .find_map(|sep| folded.find(*sep).map(|i| (i, i + sep.len())))
        .or_else(|| {
            [",", "|", " - "]
                .iter()
                .filter_map(|sep| folded.find(*sep).map(|i| (i, i + sep.len())))
                .min()
        });

    let (role, organization) = match split {
        Some((role_end, org_start)) => (&label[..role_end], &label[org_start..]),
        None => (label, ""),
    };
    let organization = organization
        .split(|c: char| matches!(c, ',' | '|'))
        .next()
        .unwrap_or("");

    (non_empty(trim_label(role)), non_empty(trim_label(organization)))
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Date helpers
// ────────────────────────────────────────────────────────────────────────────

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn bound(caps: &Captures<'_>, month_name: &str, month_num: &str, year: &str) -> Option<NaiveDate> {
    let year: i32 = caps.name(year)?.as_str().parse().ok()?;
    let month = match (caps.name(month_name), caps.name(month_num)) {
        (Some(m), _) => month_number(m.as_str())?,
        (None, Some(n)) => n.as_str().parse().ok()?,
        // Year-only bounds resolve to January: "2018 - 2020" is two years.
        (None, None) => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn range_start(caps: &Captures<'_>) -> Option<NaiveDate> {
    bound(caps, "sm", "smn", "sy")
}

fn range_end(caps: &Captures<'_>) -> Option<NaiveDate> {
    bound(caps, "em", "emn", "ey")
}

/// Whole days between two dates expressed in years, rounded to two decimals.
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    let days = (end - start).num_days().max(0) as f64;
    round2(days / DAYS_PER_YEAR)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
