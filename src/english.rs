//! English-name validity classifier.
//!
//! A cheap, deterministic pre-filter deciding which records need to go to the
//! translation oracle. It is deliberately conservative: a name passes only if
//! it is non-empty ASCII and contains none of the academic loanwords that give
//! away an untranslated name.

use regex::Regex;
use std::sync::OnceLock;

/// Textual forms of "no value" left behind by spreadsheet tooling.
const MISSING_SENTINELS: &[&str] = &["nan", "none", "null"];

/// Academic terms that mark a name as not (fully) English.
///
/// Accented spellings are listed next to their plain-ASCII variants even
/// though the ASCII check already rejects them, so the list reads as the
/// complete vocabulary.
const NON_ENGLISH_TERMS: &[&str] = &[
    // Spanish / Portuguese / Italian
    "universidad",
    "facultad",
    "escuela",
    "politécnica",
    "politecnica",
    "autónoma",
    "autonoma",
    "universidade",
    "instituto",
    "superior",
    "nacional",
    "católica",
    "catolica",
    "pontificia",
    "degli",
    "studi",
    "accademia",
    "politecnico",
    "universita",
    // French
    "universite",
    "ecole",
    "superieur",
    "superieure",
    "francais",
    "academie",
    "conservatoire",
    "royale",
    // German / Dutch
    "universitat",
    "hochschule",
    "fachhochschule",
    "akademie",
    "hogeschool",
    "vrije",
    // Polish / Czech / Slovak / Hungarian
    "uniwersytet",
    "politechnika",
    "univerzita",
    "vysoka",
    "skola",
    "egyetem",
];

/// Substrings in an oracle answer that mean it failed to translate.
const FAILED_ANSWER_MARKERS: &[&str] = &["error", "unknown", "n/a", "cannot translate"];

static NON_ENGLISH_REGEX: OnceLock<Regex> = OnceLock::new();

fn non_english_regex() -> &'static Regex {
    NON_ENGLISH_REGEX.get_or_init(|| {
        let alternatives = NON_ENGLISH_TERMS
            .iter()
            .map(|term| regex::escape(term))
            .collect::<Vec<_>>()
            .join("|");
        // A term only counts as a whole token: bounded by the ends of the
        // string or by any non-alphanumeric character.
        Regex::new(&format!("(?:^|[^a-z0-9])(?:{})(?:$|[^a-z0-9])", alternatives))
            .expect("non-English term pattern is valid")
    })
}

/// Whether the value is absent: empty, whitespace-only or a missing sentinel.
pub fn is_missing(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || MISSING_SENTINELS
            .iter()
            .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
}

/// Decide whether a candidate English name is acceptable as-is.
///
/// Rejects missing values, anything containing a non-ASCII code point and any
/// name containing a denylisted academic loanword as a distinct token.
pub fn is_valid_english(text: &str) -> bool {
    if is_missing(text) || !text.is_ascii() {
        return false;
    }
    !non_english_regex().is_match(&text.to_ascii_lowercase())
}

/// Same as [`is_valid_english`] for optional values; `None` is never valid.
pub fn is_valid_english_opt(text: Option<&str>) -> bool {
    text.is_some_and(is_valid_english)
}

/// Whether an oracle answer is a placeholder for "could not translate".
pub fn is_failed_answer(text: &str) -> bool {
    // Plain substring match, looser than the whole-token rule in `is_valid_english`.
    let lower = text.to_lowercase();
    FAILED_ANSWER_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}
