use serde::{Deserialize, Serialize};

use crate::normalize::normalize;

/// One institution as reported by a single source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub native_name: String,
    pub english_name: String,
}

impl Record {
    pub fn new(native_name: impl Into<String>, english_name: impl Into<String>) -> Self {
        Self {
            native_name: native_name.into(),
            english_name: english_name.into(),
        }
    }

    /// Identity key of this record within its store.
    pub fn key(&self) -> String {
        normalize(&self.native_name)
    }
}

/// Clean an English name before it is stored.
///
/// Wrapping double quotes are stripped, commas become spaces and any remaining
/// double quote becomes an apostrophe, so the value never needs CSV quoting.
pub fn sanitize_english(raw: &str) -> String {
    let mut text = raw.trim();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text = text[1..text.len() - 1].trim();
    }
    text.replace(',', " ").replace('"', "'").trim().to_string()
}
