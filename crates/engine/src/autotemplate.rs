//! Automatic templating of captured content
//!
//! Replaces occurrences of template data values in captured text with the
//! expression that renders them, e.g. the user's e-mail address with
//! `{{ email }}`. Rendering the result against the same data gives back the
//! original text.

use crate::secrets::is_binary;

/// Values shorter than this are too likely to match by accident
const MIN_VALUE_LEN: usize = 3;

#[derive(Debug)]
struct TemplateVariable {
    path: String,
    value: String,
}

/// Substitute template data values into `content`
///
/// Returns the new content and whether anything was substituted. Binary
/// and non UTF-8 content is returned unchanged.
pub fn auto_template(content: &[u8], data: &serde_json::Value) -> (Vec<u8>, bool) {
    if is_binary(content) {
        return (content.to_vec(), false);
    }
    let Ok(text) = std::str::from_utf8(content) else {
        return (content.to_vec(), false);
    };

    let mut variables = extract_variables(data, "");
    // Longer values first, then shallower paths, then by name
    variables.sort_by(|a, b| {
        b.value
            .len()
            .cmp(&a.value.len())
            .then_with(|| a.path.matches('.').count().cmp(&b.path.matches('.').count()))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut replacements: Vec<(usize, usize, String)> = Vec::new();
    for var in variables.iter().filter(|v| v.value.len() >= MIN_VALUE_LEN) {
        let mut pos = 0;
        while let Some(idx) = text[pos..].find(&var.value) {
            let start = pos + idx;
            let end = start + var.value.len();
            let overlaps = replacements
                .iter()
                .any(|(r_start, r_end, _)| start < *r_end && end > *r_start);
            if !overlaps {
                replacements.push((start, end, format!("{{{{ {} }}}}", var.path)));
            }
            pos = end;
        }
    }

    if replacements.is_empty() {
        return (content.to_vec(), false);
    }

    replacements.sort_by_key(|(start, _, _)| *start);

    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    for (start, end, replacement) in replacements {
        result.push_str(&text[last_end..start]);
        result.push_str(&replacement);
        last_end = end;
    }
    result.push_str(&text[last_end..]);

    (result.into_bytes(), true)
}

/// Every string leaf of `value` with its dotted path
fn extract_variables(value: &serde_json::Value, prefix: &str) -> Vec<TemplateVariable> {
    let mut variables = Vec::new();
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                variables.extend(extract_variables(val, &path));
            }
        }
        serde_json::Value::String(s) if !prefix.is_empty() => {
            variables.push(TemplateVariable {
                path: prefix.to_string(),
                value: s.clone(),
            });
        }
        _ => {}
    }
    variables
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitutes_values() {
        let data = json!({"email": "me@example.com", "hearth": {"dest_dir": "/home/me"}});
        let (out, changed) = auto_template(
            b"[user]\n  email = me@example.com\n  dir = /home/me/src\n",
            &data,
        );
        assert!(changed);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[user]\n  email = {{ email }}\n  dir = {{ hearth.dest_dir }}/src\n"
        );
    }

    #[test]
    fn test_longest_value_wins() {
        let data = json!({"user": "alice", "name": "alice smith"});
        let (out, _) = auto_template(b"alice smith and alice", &data);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{{ name }} and {{ user }}"
        );
    }

    #[test]
    fn test_short_values_and_binary_untouched() {
        let data = json!({"x": "ab", "long": "value"});
        let (out, changed) = auto_template(b"ab ab", &data);
        assert!(!changed);
        assert_eq!(out, b"ab ab");

        let (out, changed) = auto_template(b"value\0", &data);
        assert!(!changed);
        assert_eq!(out, b"value\0");
    }

    #[test]
    fn test_non_string_values_ignored() {
        let data = json!({"port": 8080, "flags": ["value"]});
        let (_, changed) = auto_template(b"8080 value", &data);
        assert!(!changed);
    }
}
