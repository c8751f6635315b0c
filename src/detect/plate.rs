//! Plate text selection.
//!
//! OCR on a plate crop usually yields several lines: the registration itself
//! plus region names, dealer frames or stickers. A candidate qualifies when its
//! score beats the threshold and, once stripped to alphanumerics, it still
//! contains a digit. Mixed letter+digit readings win over purely numeric ones.

use std::sync::OnceLock;

use regex::Regex;

use super::result::TextCandidate;

fn plate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]*[0-9][A-Za-z0-9]*$").expect("static regex"))
}

fn all_digits() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+$").expect("static regex"))
}

/// Strip everything but ASCII letters and digits.
pub fn normalize_plate_text(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Pick the plate reading from OCR candidates, or `None` if nothing qualifies.
pub fn select_plate_text(candidates: &[TextCandidate], threshold: f32) -> Option<(String, f32)> {
    let shortlisted: Vec<(String, f32)> = candidates
        .iter()
        .filter(|c| c.score > threshold)
        .map(|c| (normalize_plate_text(&c.text), c.score))
        .filter(|(text, _)| plate_pattern().is_match(text))
        .collect();

    let mut best: Option<&(String, f32)> = None;
    for item in &shortlisted {
        if !all_digits().is_match(&item.0) {
            return Some(item.clone());
        }
        if best.map_or(true, |b| item.1 > b.1) {
            best = Some(item);
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(text: &str, score: f32) -> TextCandidate {
        TextCandidate::new(text, score)
    }

    #[test]
    fn prefers_letter_digit_mix() {
        let got = select_plate_text(&[c("2023", 0.99), c("LEA-4821", 0.8)], 0.5);
        assert_eq!(got, Some(("LEA4821".to_string(), 0.8)));
    }

    #[test]
    fn falls_back_to_highest_numeric() {
        let got = select_plate_text(&[c("1234", 0.7), c("98765", 0.9)], 0.5);
        assert_eq!(got, Some(("98765".to_string(), 0.9)));
    }

    #[test]
    fn drops_low_scores_and_digitless_text() {
        assert_eq!(select_plate_text(&[c("PUNJAB", 0.95)], 0.5), None);
        assert_eq!(select_plate_text(&[c("AB12", 0.4)], 0.5), None);
        assert_eq!(select_plate_text(&[], 0.5), None);
    }

    #[test]
    fn normalizes_punctuation_and_spaces() {
        assert_eq!(normalize_plate_text(" ab 12·cd "), "ab12cd");
    }
}
