//! Text normalizer: turns producer output into bounded, case-folded text units.
//!
//! Every unit keeps two copies of the same text: `display` (original case, for
//! spans shown to humans) and `folded` (lower case, for matching). Folding is
//! length-preserving per character, so a byte range found in `folded` slices
//! `display` at the same offsets.

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

/// One line or sentence of a document, the bound for every pattern search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    pub index: usize,
    pub display: String,
    pub folded: String,
}

impl TextUnit {
    fn new(index: usize, display: String) -> Self {
        let folded = fold_case(&display);
        Self {
            index,
            display,
            folded,
        }
    }

    /// Slices the display copy with a byte range found in the folded copy.
    pub fn display_span(&self, start: usize, end: usize) -> &str {
        &self.display[start..end]
    }
}

/// Canonical text of one document. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedText {
    units: Vec<TextUnit>,
}

impl NormalizedText {
    pub fn units(&self) -> &[TextUnit] {
        &self.units
    }
}

/// Normalizes raw text into units. Fails only when nothing alphanumeric survives.
pub fn normalize(raw_text: &str) -> Result<NormalizedText, PipelineError> {
    let cleaned = clean_characters(raw_text);

    let mut units = Vec::new();
    for line in cleaned.lines() {
        let collapsed = collapse_whitespace(line);
        for sentence in split_sentences(&collapsed) {
            if sentence.chars().any(char::is_alphanumeric) {
                units.push(TextUnit::new(units.len(), sentence.to_string()));
            }
        }
    }

    if units.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    Ok(NormalizedText { units })
}

/// Maps typography to ASCII, turns bullets/CR into line breaks and drops
/// control and zero-width characters.
fn clean_characters(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\n' | '\r' | '\u{2028}' | '\u{2029}' | '\u{000C}' => out.push('\n'),
            '•' | '●' | '▪' | '■' | '◦' | '·' | '➢' | '►' | '\u{F0B7}' => out.push('\n'),
            '\t' | '\u{00A0}' | '\u{2007}' | '\u{202F}' => out.push(' '),
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2018}' | '\u{2019}' | '\u{201B}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{200B}'..='\u{200D}' | '\u{FEFF}' | '\u{00AD}' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits a line at `. `, `! `, `? ` followed by an uppercase letter, unless the
/// word before the terminator is short or dotted (`B.Sc.`, `Inc.`, `Dr.`).
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = line.char_indices().collect();

    for i in 0..chars.len() {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let next_is_space = chars.get(i + 1).map(|&(_, n)| n == ' ').unwrap_or(false);
        let after_is_upper = chars
            .get(i + 2)
            .map(|&(_, n)| n.is_uppercase())
            .unwrap_or(false);
        if !next_is_space || !after_is_upper {
            continue;
        }

        let word = line[start..pos].rsplit(' ').next().unwrap_or("");
        if c == '.' && (word.chars().count() < 4 || word.contains('.')) {
            continue;
        }

        let end = pos + c.len_utf8();
        sentences.push(line[start..end].trim());
        start = end;
    }

    let rest = line[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Lower-cases a string without changing any character's UTF-8 width.
/// Characters whose lowercase form is wider or multi-char are kept as is.
pub fn fold_case(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) if l.len_utf8() == c.len_utf8() => l,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(normalize(""), Err(PipelineError::EmptyInput));
    }

    #[test]
    fn test_whitespace_and_control_only_fails() {
        assert_eq!(
            normalize("  \n\t\u{0007}\u{200B} -- • ..."),
            Err(PipelineError::EmptyInput)
        );
    }

    #[test]
    fn test_collapses_whitespace_runs() {
        let text = normalize("Python    and\t\tSQL").unwrap();
        assert_eq!(text.units()[0].display, "Python and SQL");
    }

    #[test]
    fn test_folded_copy_is_lowercase_and_aligned() {
        let text = normalize("Senior ENGINEER at Acme").unwrap();
        let unit = &text.units()[0];
        assert_eq!(unit.folded, "senior engineer at acme");
        let start = unit.folded.find("engineer").unwrap();
        assert_eq!(unit.display_span(start, start + 8), "ENGINEER");
    }

    #[test]
    fn test_fold_keeps_width_for_special_chars() {
        // 'İ' lowercases to two chars; it must stay put to keep offsets aligned.
        let folded = fold_case("İstanbul Üniversitesi");
        assert_eq!(folded.len(), "İstanbul Üniversitesi".len());
        assert!(folded.ends_with("üniversitesi"));
    }

    #[test]
    fn test_typographic_dashes_become_ascii() {
        let text = normalize("Bachelor of Science, 2018–2020").unwrap();
        assert!(text.units()[0].display.ends_with("2018-2020"));
    }

    #[test]
    fn test_bullets_split_units() {
        let text = normalize("Skills: • Python • Docker").unwrap();
        let displays: Vec<_> = text.units().iter().map(|u| u.display.as_str()).collect();
        assert_eq!(displays, vec!["Skills:", "Python", "Docker"]);
    }

    #[test]
    fn test_splits_sentences_but_not_abbreviations() {
        let text =
            normalize("Earned a B.Sc. Computer Science at Unilag. Worked at Andela since 2019.")
                .unwrap();
        let displays: Vec<_> = text.units().iter().map(|u| u.display.as_str()).collect();
        assert_eq!(
            displays,
            vec![
                "Earned a B.Sc. Computer Science at Unilag.",
                "Worked at Andela since 2019."
            ]
        );
    }

    #[test]
    fn test_unit_indices_are_sequential() {
        let text = normalize("one\n\n\ntwo\nthree").unwrap();
        let indices: Vec<_> = text.units().iter().map(|u| u.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
