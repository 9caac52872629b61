//! Locating JSON inside free-form model output.
//!
//! Models wrap answers in prose and markdown fences. The first fenced block
//! is preferred; otherwise the first balanced `{...}` or `[...]` that parses
//! wins. Brackets inside string literals are ignored while balancing.

use serde_json::Value;

/// Extract the first JSON structure from `text`.
pub fn extract_json(text: &str) -> Option<Value> {
    if let Some(fenced) = fenced_block(text) {
        if let Some(value) = first_balanced(fenced) {
            return Some(value);
        }
    }
    first_balanced(text)
}

/// Like [`extract_json`], but only accepts an object.
pub fn extract_json_object(text: &str) -> Option<Value> {
    extract_json(text).filter(Value::is_object)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip an info string such as `json` up to the end of the line.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn first_balanced(text: &str) -> Option<Value> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(['{', '[']) {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(value);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Index of the bracket closing the one at `start`, if any.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_prose_around_object() {
        let text = "Sure! Here is the result:\n{\"relationship\": \"duplicate\"}\nHope that helps.";
        assert_eq!(extract_json(text), Some(json!({"relationship": "duplicate"})));
    }

    #[test]
    fn test_fenced_block_preferred() {
        let text = "Example: {\"x\": 0}\n```json\n{\"x\": 1}\n```";
        assert_eq!(extract_json(text), Some(json!({"x": 1})));
    }

    #[test]
    fn test_braces_inside_strings() {
        let text = r#"{"summary": "use {braces} and \"quotes\" }", "n": 2} trailing }"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["n"], 2);
        assert_eq!(value["summary"], "use {braces} and \"quotes\" }");
    }

    #[test]
    fn test_skips_unparseable_candidate() {
        let text = "{not json} then {\"ok\": true}";
        assert_eq!(extract_json(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("{\"unterminated\": "), None);
        assert_eq!(extract_json_object("[1, 2]"), None);
    }
}
