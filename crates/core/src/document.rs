//! Metadata records attached to packed vectors.
//!
//! A [`Record`] is an arbitrary JSON object (identifier, title, category, free
//! text, ...) describing one row of a shard. Records are positional: record `i`
//! always describes packed vector `i`, and the two collections are never
//! reordered independently.

use crate::config;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field mapping describing one corpus row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds a record from `(field, value)` pairs.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The record's `id` field rendered as text, or `row` when the field is
    /// absent or not a scalar.
    pub fn record_id(&self, row: usize) -> String {
        match self.fields.get(config::ID_FIELD) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => row.to_string(),
        }
    }

    /// First non-empty text field (`abstract`, then `text`, then `summary`).
    pub fn text(&self) -> Option<&str> {
        config::TEXT_FIELDS
            .iter()
            .filter_map(|field| self.fields.get(*field).and_then(Value::as_str))
            .find(|s| !s.is_empty())
    }

    pub fn text_preview(&self) -> String {
        text_preview(self.text())
    }
}

/// Bounded excerpt of `text`: at most [`config::PREVIEW_CHARS`] characters,
/// with an ellipsis only when something was cut.
pub fn text_preview(text: Option<&str>) -> String {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return config::NO_PREVIEW.to_string();
    };
    match text.char_indices().nth(config::PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], config::PREVIEW_ELLIPSIS),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_prefers_id_field() {
        let r = Record::from_pairs([("id", json!("2401.00001"))]);
        assert_eq!(r.record_id(7), "2401.00001");

        let r = Record::from_pairs([("id", json!(42))]);
        assert_eq!(r.record_id(7), "42");

        let r = Record::from_pairs([("title", json!("no id"))]);
        assert_eq!(r.record_id(7), "7");
    }

    #[test]
    fn test_text_field_order() {
        let r = Record::from_pairs([
            ("text", json!("from text")),
            ("abstract", json!("")),
            ("summary", json!("from summary")),
        ]);
        assert_eq!(r.text(), Some("from text"));
    }

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(text_preview(Some("short abstract")), "short abstract");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let long = "a".repeat(250);
        let preview = text_preview(Some(&long));
        assert_eq!(preview.len(), config::PREVIEW_CHARS + config::PREVIEW_ELLIPSIS.len());
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn test_preview_exact_limit_has_no_ellipsis() {
        let exact = "b".repeat(config::PREVIEW_CHARS);
        assert_eq!(text_preview(Some(&exact)), exact);
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let long: String = std::iter::repeat('é').take(210).collect();
        let preview = text_preview(Some(&long));
        assert_eq!(preview.chars().count(), config::PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_preview_missing_text() {
        assert_eq!(text_preview(None), config::NO_PREVIEW);
        assert_eq!(text_preview(Some("")), config::NO_PREVIEW);
        assert_eq!(Record::default().text_preview(), config::NO_PREVIEW);
    }

    #[test]
    fn test_record_serializes_as_plain_object() {
        let r = Record::from_pairs([("id", json!("x")), ("category", json!("cs.IR"))]);
        let s = serde_json::to_value(&r).unwrap();
        assert_eq!(s, json!({"id": "x", "category": "cs.IR"}));
    }
}
