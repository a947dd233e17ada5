//! Input sanitizing for request payloads.
//!
//! Strips markup and script-injection patterns from strings before they reach
//! business logic. Sanitizing is pure: callers get a new value back and decide
//! where to store it.

use serde_json::Value;

/// Object keys whose values are never rewritten. Secrets are hashed, never
/// rendered, and altering them would break credential checks.
const SECRET_FIELDS: &[&str] = &["password", "currentPassword", "newPassword"];

/// Sanitizes a single string.
///
/// Removes `<` and `>`, every `javascript:` (any case), inline event-handler
/// prefixes such as `onerror=` (any case, at a word start), then trims
/// surrounding whitespace. The steps repeat until nothing changes, so the
/// result is stable: `sanitize_str(&sanitize_str(s)) == sanitize_str(s)`.
pub fn sanitize_str(input: &str) -> String {
    let mut current = sanitize_pass(input);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Sanitizes a JSON value recursively: strings are cleaned, arrays and object
/// values are walked, everything else passes through.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    if SECRET_FIELDS.contains(&key.as_str()) {
                        (key, v)
                    } else {
                        (key, sanitize_value(v))
                    }
                })
                .collect(),
        ),
        other => other,
    }
}

/// Returns `true` when `key` holds a secret that sanitizing leaves alone.
pub fn is_secret_field(key: &str) -> bool {
    SECRET_FIELDS.contains(&key)
}

fn sanitize_pass(input: &str) -> String {
    let without_brackets: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let without_scheme = remove_ignore_ascii_case(&without_brackets, "javascript:");
    remove_event_handlers(&without_scheme).trim().to_string()
}

/// Removes every non-overlapping occurrence of the ASCII `needle`, ignoring case.
fn remove_ignore_ascii_case(haystack: &str, needle: &str) -> String {
    // ASCII lowercasing keeps byte offsets identical.
    let lower = haystack.to_ascii_lowercase();
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    let mut search_from = 0;
    while let Some(found) = lower[search_from..].find(needle) {
        let start = search_from + found;
        out.push_str(&haystack[last..start]);
        last = start + needle.len();
        search_from = last;
    }
    out.push_str(&haystack[last..]);
    out
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Removes `on<word>=` sequences that start at a word boundary.
fn remove_event_handlers(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        let at_boundary = i == 0 || !is_word_byte(bytes[i - 1]);
        if at_boundary && bytes[i].eq_ignore_ascii_case(&b'o') && bytes[i + 1].eq_ignore_ascii_case(&b'n')
        {
            let mut j = i + 2;
            while j < bytes.len() && is_word_byte(bytes[j]) {
                j += 1;
            }
            if j > i + 2 && j < bytes.len() && bytes[j] == b'=' {
                out.push_str(&input[last..i]);
                last = j + 1;
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&input[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_script_tags() {
        let clean = sanitize_str("<script>alert(1)</script>");
        assert!(!clean.contains('<'));
        assert!(!clean.contains('>'));
        assert_eq!(clean, "scriptalert(1)/script");
    }

    #[test]
    fn strips_javascript_scheme_in_any_case() {
        assert_eq!(sanitize_str("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_str("go to jAvAsCrIpT:void(0) now"), "go to void(0) now");
    }

    #[test]
    fn strips_inline_event_handlers() {
        assert_eq!(
            sanitize_str("<img src=x onerror=alert(1)>"),
            "img src=x alert(1)"
        );
        assert_eq!(sanitize_str("ONCLICK=steal()"), "steal()");
    }

    #[test]
    fn leaves_words_containing_on_alone() {
        assert_eq!(sanitize_str("condition=ok"), "condition=ok");
        assert_eq!(sanitize_str("Jonas Silva"), "Jonas Silva");
        assert_eq!(sanitize_str("on=1"), "on=1");
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitize_str("  Maria  "), "Maria");
    }

    #[test]
    fn nested_patterns_are_removed_completely() {
        let input = "javajavascript:script:alert(1)";
        let once = sanitize_str(input);
        assert!(!once.to_ascii_lowercase().contains("javascript:"));
        assert_eq!(sanitize_str(&once), once);

        let sneaky = "o<nclick=x";
        assert_eq!(sanitize_str(sneaky), "x");
    }

    #[test]
    fn idempotent_on_assorted_inputs() {
        let samples = [
            "",
            "   ",
            "plain text",
            "<b>bold</b>",
            " onload=x onerror=y ",
            "JAVASCRIPT:javascript:",
            "a<>b<<>>c",
            "ção <onmouseover=1> ü",
            "x\tonfocus=\ty",
        ];
        for s in samples {
            let once = sanitize_str(s);
            assert_eq!(sanitize_str(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn sanitizes_nested_json() {
        let input = json!({
            "name": " <b>Ana</b> ",
            "age": 31,
            "active": true,
            "tags": ["<i>x</i>", 2, null],
            "address": { "street": "javascript:Rua 1" },
            "password": " <keep> "
        });
        let clean = sanitize_value(input);
        assert_eq!(
            clean,
            json!({
                "name": "bAna/b",
                "age": 31,
                "active": true,
                "tags": ["ix/i", 2, null],
                "address": { "street": "Rua 1" },
                "password": " <keep> "
            })
        );
    }

    #[test]
    fn sanitize_value_is_idempotent() {
        let input = json!({"a": ["<x onclick=1>", {"b": " javascript:y "}]});
        let once = sanitize_value(input);
        assert_eq!(sanitize_value(once.clone()), once);
    }
}
