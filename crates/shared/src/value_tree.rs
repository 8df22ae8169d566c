//! Recursive value-tree walker (spec §9)
//!
//! Bidi-control stripping, PII redaction, and template interpolation all
//! need to recurse through the same shape of data — a nested
//! map/list/scalar tree — applying a per-node visitor to every string
//! leaf. This module implements that walk once and parameterizes it by
//! visitor, rather than letting each use case grow its own divergent
//! recursion.

use serde_json::Value;

/// Recursively apply `visit` to every string leaf of `value`, returning
/// a new tree with the same shape. Non-string scalars and container
/// structure are preserved untouched.
pub fn walk_strings(value: &Value, visit: &mut impl FnMut(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(visit(s)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| walk_strings(v, visit)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk_strings(v, visit)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Unicode bidi/embedding control codepoints that must never survive
/// into persisted event data or logs (spoofing / hidden-text vector).
const BIDI_CONTROLS: [char; 9] = [
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', '\u{2066}', '\u{2067}', '\u{2068}',
    '\u{2069}',
];

/// Strip bidi/embedding controls from every string leaf in `value`
/// (spec §4.D step 1, invariant 9).
pub fn strip_bidi_controls(value: &Value) -> Value {
    walk_strings(value, &mut |s| {
        s.chars().filter(|c| !BIDI_CONTROLS.contains(c)).collect()
    })
}

pub fn strip_bidi_controls_str(s: &str) -> String {
    s.chars().filter(|c| !BIDI_CONTROLS.contains(c)).collect()
}

/// Resolve a dot-notation path (`a.b.c`, array indices as numeric
/// segments `a.0.b`) against a JSON value. Returns `None` on any missing
/// segment.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let idx: usize = segment.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Stringify a resolved value the way template interpolation needs:
/// strings pass through unquoted, scalars render as their display
/// form, missing/null become empty string, containers serialize as
/// compact JSON.
pub fn stringify_for_template(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => {
            serde_json::to_string(v).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_bidi_controls_removes_embedding_marks() {
        let input = json!({"name": "A\u{202E}evil\u{202C}B", "nested": ["x\u{2066}y"]});
        let output = strip_bidi_controls(&input);
        assert_eq!(output["name"], json!("AevilB"));
        assert_eq!(output["nested"][0], json!("xy"));
    }

    #[test]
    fn test_strip_bidi_controls_reversing_twice_is_identity() {
        let s = "\u{202E}Hebrew-like text\u{202C}";
        let once = strip_bidi_controls_str(s);
        let twice = strip_bidi_controls_str(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_bidi_controls_leaves_plain_strings_untouched() {
        let input = json!({"a": "plain text", "b": 42, "c": null});
        let output = strip_bidi_controls(&input);
        assert_eq!(output, input);
    }

    #[test]
    fn test_get_path_resolves_nested_dotted_path() {
        let data = json!({"data": {"form": {"id": "F1"}}});
        assert_eq!(get_path(&data, "data.form.id"), Some(&json!("F1")));
    }

    #[test]
    fn test_get_path_resolves_array_index_segment() {
        let data = json!({"items": [{"id": 1}, {"id": 2}]});
        assert_eq!(get_path(&data, "items.1.id"), Some(&json!(2)));
    }

    #[test]
    fn test_get_path_missing_segment_is_none() {
        let data = json!({"a": 1});
        assert_eq!(get_path(&data, "a.b.c"), None);
    }

    #[test]
    fn test_stringify_for_template_variants() {
        assert_eq!(stringify_for_template(None), "");
        assert_eq!(stringify_for_template(Some(&Value::Null)), "");
        assert_eq!(stringify_for_template(Some(&json!("hi"))), "hi");
        assert_eq!(stringify_for_template(Some(&json!(42))), "42");
        assert_eq!(stringify_for_template(Some(&json!(true))), "true");
        assert_eq!(stringify_for_template(Some(&json!([1, 2]))), "[1,2]");
    }
}
