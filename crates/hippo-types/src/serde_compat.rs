//! Lenient serde deserializers for model-produced JSON.
//!
//! Extraction responses come from a text generator and drift in shape from
//! run to run: a list arrives as a comma-separated string, a string arrives as
//! a list, a category map arrives where a flat list was asked for. These
//! helpers coerce what they can and fall back to an empty value for the rest,
//! so one odd field never fails the whole document.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;

/// Deserialize a list of strings leniently.
///
/// - sequence: string and number elements are kept whole, everything else dropped
/// - string: split on commas
/// - map: each value is read as a list (a string value is split), keys dropped
/// - anything else: empty
pub fn strings_lenient<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringsLenientVisitor;

    impl<'de> Visitor<'de> for StringsLenientVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a list of strings (or any value, coerced or defaulted)")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(item) = seq.next_element::<serde_json::Value>()? {
                flatten_value(&item, &mut out);
            }
            Ok(out)
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some((_, value)) = map.next_entry::<de::IgnoredAny, serde_json::Value>()? {
                collect_list(&value, &mut out);
            }
            Ok(out)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(split_list(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_f64<E: de::Error>(self, _v: f64) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(StringsLenientVisitor)
}

/// Deserialize a free-text field leniently: strings pass through, numbers are
/// stringified, lists of strings are joined with `"; "`, anything else is empty.
pub fn text_lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct TextLenientVisitor;

    impl<'de> Visitor<'de> for TextLenientVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string (or any value, coerced or defaulted)")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.trim().to_string())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut parts = Vec::new();
            while let Some(item) = seq.next_element::<serde_json::Value>()? {
                flatten_value(&item, &mut parts);
            }
            Ok(parts.join("; "))
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            while map
                .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                .is_some()
            {}
            Ok(String::new())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, _v: bool) -> Result<Self::Value, E> {
            Ok(String::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(String::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(TextLenientVisitor)
}

/// Deserialize an optional confidence leniently: numbers and numeric strings
/// are accepted and clamped to `[0, 1]`; anything else is `None`.
pub fn confidence_lenient<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed
        .filter(|v| v.is_finite())
        .map(|v| if v > 1.0 { v / 100.0 } else { v })
        .map(|v| v.clamp(0.0, 1.0) as f32))
}

/// Append a list-shaped JSON value. A bare string is a comma-separated list;
/// arrays and objects go through [`flatten_value`], objects value by value.
pub fn collect_list(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.extend(split_list(s)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_list(v, out)),
        other => flatten_value(other, out),
    }
}

/// Append the string content of a JSON value: strings (trimmed, whole) and
/// numbers directly, arrays and objects recursively. Blank strings are skipped.
pub fn flatten_value(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| flatten_value(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| flatten_value(v, out)),
        _ => {}
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestList {
        #[serde(default, deserialize_with = "strings_lenient")]
        items: Vec<String>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestText {
        #[serde(default, deserialize_with = "text_lenient")]
        text: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestConfidence {
        #[serde(default, deserialize_with = "confidence_lenient")]
        confidence: Option<f32>,
    }

    #[test]
    fn strings_lenient_accepts_sequence() {
        let result: TestList = serde_json::from_str(r#"{"items": ["a", "b", 3, null]}"#).unwrap();
        assert_eq!(result.items, vec!["a", "b", "3"]);
    }

    #[test]
    fn strings_lenient_splits_string() {
        let result: TestList = serde_json::from_str(r#"{"items": "rust, sqlite ,"}"#).unwrap();
        assert_eq!(result.items, vec!["rust", "sqlite"]);
    }

    #[test]
    fn strings_lenient_keeps_commas_inside_elements() {
        let result: TestList =
            serde_json::from_str(r#"{"items": [" Acme, Inc. ", "", "then migrate, staging"]}"#).unwrap();
        assert_eq!(result.items, vec!["Acme, Inc.", "then migrate, staging"]);
    }

    #[test]
    fn strings_lenient_splits_string_map_values() {
        let json = r#"{"items": {"people": "Dana, Lee", "tools": ["Postgres, 16"]}}"#;
        let result: TestList = serde_json::from_str(json).unwrap();
        assert_eq!(result.items, vec!["Dana", "Lee", "Postgres, 16"]);
    }

    #[test]
    fn strings_lenient_flattens_map() {
        let json = r#"{"items": {"people": ["Alice"], "tools": ["Postgres", "Redis"]}}"#;
        let result: TestList = serde_json::from_str(json).unwrap();
        assert_eq!(result.items, vec!["Alice", "Postgres", "Redis"]);
    }

    #[test]
    fn strings_lenient_given_bool_returns_empty() {
        let result: TestList = serde_json::from_str(r#"{"items": true}"#).unwrap();
        assert!(result.items.is_empty());
    }

    #[test]
    fn strings_lenient_missing_field_defaults() {
        let result: TestList = serde_json::from_str("{}").unwrap();
        assert!(result.items.is_empty());
    }

    #[test]
    fn text_lenient_joins_list() {
        let result: TestText = serde_json::from_str(r#"{"text": ["urgent", "tired"]}"#).unwrap();
        assert_eq!(result.text, "urgent; tired");
    }

    #[test]
    fn text_lenient_given_map_returns_empty() {
        let result: TestText = serde_json::from_str(r#"{"text": {"a": 1}}"#).unwrap();
        assert_eq!(result.text, "");
    }

    #[test]
    fn confidence_lenient_variants() {
        let a: TestConfidence = serde_json::from_str(r#"{"confidence": 0.8}"#).unwrap();
        assert_eq!(a.confidence, Some(0.8));
        let b: TestConfidence = serde_json::from_str(r#"{"confidence": "85%"}"#).unwrap();
        assert_eq!(b.confidence, Some(0.85));
        let c: TestConfidence = serde_json::from_str(r#"{"confidence": "high"}"#).unwrap();
        assert_eq!(c.confidence, None);
        let d: TestConfidence = serde_json::from_str("{}").unwrap();
        assert_eq!(d.confidence, None);
    }
}
