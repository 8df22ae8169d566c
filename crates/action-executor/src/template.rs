//! Action config template interpolation (spec §4.F)
//!
//! Any string `{{ path }}` in an action's `config` is replaced by
//! `get(event, path)`; missing values become empty string. Arrays and
//! nested objects are walked recursively so a whole `config` tree can be
//! interpolated in one pass.

use regex::Regex;
use serde_json::Value;
use shared::value_tree::{get_path, stringify_for_template, walk_strings};
use std::sync::LazyLock;

/// Matches `{{ path }}`, tolerating surrounding whitespace inside the
/// braces (`{{path}}`, `{{ path }}`).
static VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_.]+)\s*\}\}").expect("static pattern"));

/// Interpolate every `{{ path }}` placeholder in every string leaf of
/// `config` against `event_data`, recursing through arrays/objects.
pub fn interpolate(config: &Value, event_data: &Value) -> Value {
    walk_strings(config, &mut |s| interpolate_str(s, event_data))
}

fn interpolate_str(template: &str, event_data: &Value) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }

    let mut result = String::with_capacity(template.len());
    let mut last_end = 0;

    for caps in VAR_PATTERN.captures_iter(template) {
        let whole = caps.get(0).unwrap();
        let path = &caps[1];

        result.push_str(&template[last_end..whole.start()]);
        result.push_str(&stringify_for_template(get_path(event_data, path)));
        last_end = whole.end();
    }
    result.push_str(&template[last_end..]);

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpolate_simple_path() {
        let config = json!({"url": "https://api.example.com/forms/{{ data.form_id }}"});
        let event = json!({"data": {"form_id": "F-42"}});
        let out = interpolate(&config, &event);
        assert_eq!(out["url"], "https://api.example.com/forms/F-42");
    }

    #[test]
    fn test_interpolate_missing_path_becomes_empty_string() {
        let config = json!({"note": "score={{ data.score }}"});
        let event = json!({"data": {}});
        let out = interpolate(&config, &event);
        assert_eq!(out["note"], "score=");
    }

    #[test]
    fn test_interpolate_walks_nested_arrays_and_objects() {
        let config = json!({
            "body": {
                "tags": ["{{ data.tag1 }}", "static", "{{ data.tag2 }}"]
            }
        });
        let event = json!({"data": {"tag1": "urgent", "tag2": "billing"}});
        let out = interpolate(&config, &event);
        assert_eq!(out["body"]["tags"], json!(["urgent", "static", "billing"]));
    }

    #[test]
    fn test_interpolate_numeric_value_renders_without_quotes() {
        let config = json!({"msg": "score is {{ data.score }}"});
        let event = json!({"data": {"score": 85}});
        let out = interpolate(&config, &event);
        assert_eq!(out["msg"], "score is 85");
    }

    #[test]
    fn test_interpolate_tolerates_surrounding_whitespace() {
        let config = json!({"a": "{{data.x}}", "b": "{{  data.x  }}"});
        let event = json!({"data": {"x": "v"}});
        let out = interpolate(&config, &event);
        assert_eq!(out["a"], "v");
        assert_eq!(out["b"], "v");
    }

    #[test]
    fn test_interpolate_no_placeholders_is_identity() {
        let config = json!({"a": "static text", "b": 42, "c": null});
        let event = json!({});
        assert_eq!(interpolate(&config, &event), config);
    }
}
