//! Parsing of raw fetch dumps.
//!
//! Dumps come from several near-duplicate fetch scripts and do not agree on
//! a shape: some are a bare array, some wrap it in `data`, some in
//! `data.list`. Items are loosely typed objects whose field names also vary.
//! Nothing here is trusted; anything unrecognized is counted and dropped.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::record::Record;

/// Field names that may carry the native name, in priority order.
const NATIVE_FIELDS: &[&str] = &["chinese_name", "CHINESE_NAME", "universityNameCn", "native_name"];

/// Field names that may carry the English (or original-language) name.
const ENGLISH_FIELDS: &[&str] = &[
    "english_name",
    "ENGLISH_NAME",
    "universityNameEn",
    "original_name",
];

/// Records recovered from a raw dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub records: Vec<Record>,
    /// Items that were not objects or had no native name
    pub discarded: usize,
}

/// Read and parse a raw dump file.
pub fn read_listing(path: &Path) -> Result<RawListing> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read raw listing {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse raw listing {}", path.display()))?;
    Ok(parse_listing(&value))
}

/// Extract records from any of the known dump shapes.
pub fn parse_listing(value: &Value) -> RawListing {
    let Some(items) = find_items(value) else {
        warn!("Raw listing has no recognizable item array");
        return RawListing::default();
    };

    let mut listing = RawListing::default();
    for item in items {
        match parse_item(item) {
            Some(record) => listing.records.push(record),
            None => listing.discarded += 1,
        }
    }
    listing
}

fn find_items(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => match map.get("data") {
            Some(Value::Array(items)) => Some(items),
            Some(Value::Object(inner)) => inner.get("list").and_then(Value::as_array),
            _ => map.get("list").and_then(Value::as_array),
        },
        _ => None,
    }
}

fn parse_item(item: &Value) -> Option<Record> {
    let object = item.as_object()?;
    let native_name = first_text(object, NATIVE_FIELDS)?;
    let english_name = first_text(object, ENGLISH_FIELDS).unwrap_or_default();
    Some(Record::new(native_name, english_name))
}

/// First non-empty field among `fields`, stringifying numbers.
fn first_text(object: &serde_json::Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        let text = match object.get(*field)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_array() {
        let listing = parse_listing(&json!([
            {"chinese_name": "华沙大学", "original_name": "Uniwersytet Warszawski"}
        ]));

        assert_eq!(listing.records, vec![Record::new("华沙大学", "Uniwersytet Warszawski")]);
        assert_eq!(listing.discarded, 0);
    }

    #[test]
    fn test_parse_data_array() {
        let listing = parse_listing(&json!({
            "total": 1,
            "data": [{"CHINESE_NAME": "斐济大学", "ENGLISH_NAME": "The University of Fiji"}],
            "indexList": []
        }));

        assert_eq!(listing.records, vec![Record::new("斐济大学", "The University of Fiji")]);
    }

    #[test]
    fn test_parse_data_list_object() {
        let listing = parse_listing(&json!({
            "data": {"list": [
                {"universityNameCn": "奥克兰大学", "universityNameEn": "University of Auckland"}
            ]}
        }));

        assert_eq!(listing.records, vec![Record::new("奥克兰大学", "University of Auckland")]);
    }

    #[test]
    fn test_parse_top_level_list() {
        let listing = parse_listing(&json!({"list": [{"native_name": "甲"}]}));
        assert_eq!(listing.records, vec![Record::new("甲", "")]);
    }

    #[test]
    fn test_parse_unrecognized_shapes_yield_nothing() {
        assert_eq!(parse_listing(&json!({"data": null})), RawListing::default());
        assert_eq!(parse_listing(&json!("oops")), RawListing::default());
        assert_eq!(parse_listing(&json!({"data": {"items": []}})), RawListing::default());
    }

    #[test]
    fn test_parse_discards_bad_items() {
        let listing = parse_listing(&json!([
            "not an object",
            {"ENGLISH_NAME": "No Native Name"},
            {"CHINESE_NAME": "   ", "ENGLISH_NAME": "Blank"},
            {"CHINESE_NAME": "甲", "ENGLISH_NAME": null},
        ]));

        assert_eq!(listing.records, vec![Record::new("甲", "")]);
        assert_eq!(listing.discarded, 3);
    }

    #[test]
    fn test_parse_prefers_earlier_field_names() {
        let listing = parse_listing(&json!([
            {
                "universityNameCn": "",
                "CHINESE_NAME": " 甲 ",
                "universityNameEn": "Alpha",
                "ENGLISH_NAME": "Beta"
            }
        ]));

        assert_eq!(listing.records, vec![Record::new("甲", "Beta")]);
    }

    #[test]
    fn test_parse_stringifies_numbers() {
        let listing = parse_listing(&json!([{"CHINESE_NAME": 42, "ENGLISH_NAME": 7}]));
        assert_eq!(listing.records, vec![Record::new("42", "7")]);
    }

    #[test]
    fn test_read_listing_from_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("poland_universities_raw.json");
        let dump = r#"[{"chinese_name": "华沙大学", "original_name": "Uniwersytet Warszawski"}]"#;
        fs::write(&path, dump).expect("Failed to write");

        let listing = read_listing(&path).expect("Should read");
        assert_eq!(listing.records.len(), 1);
    }

    #[test]
    fn test_read_listing_invalid_json() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("broken_universities_raw.json");
        fs::write(&path, "{not json").expect("Failed to write");

        let err = read_listing(&path).expect_err("Should fail");
        assert!(err.to_string().contains("Failed to parse raw listing"));
    }
}
