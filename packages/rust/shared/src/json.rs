//! Pulling one JSON value out of free-form model output.
//!
//! Two phases, each returning an optional match:
//! 1. a fenced code block (```` ```json ```` or an untagged fence holding JSON);
//! 2. a balanced `{...}` / `[...]` span found by scanning, string-aware.
//!
//! Callers branch on [`StructuredError::NoJsonFound`] versus
//! [`StructuredError::Malformed`]; they are distinct failures.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::StructuredError;
use crate::text::truncate_chars;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_-]*)[ \t]*\r?\n?(.*?)```").expect("valid fence regex")
});

const EXCERPT_CHARS: usize = 120;

/// Locate the JSON-bearing substring in `text`, if any.
pub fn extract_json(text: &str) -> Option<&str> {
    fenced_json(text).or_else(|| balanced_json(text))
}

/// Extract and deserialize a JSON value of type `T` from model output.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, StructuredError> {
    let span = extract_json(text).ok_or_else(|| StructuredError::NoJsonFound {
        excerpt: truncate_chars(text.trim(), EXCERPT_CHARS).to_string(),
    })?;

    serde_json::from_str(span).map_err(|source| StructuredError::Malformed {
        excerpt: truncate_chars(span, EXCERPT_CHARS).to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Phase 1: fenced blocks
// ---------------------------------------------------------------------------

fn fenced_json(text: &str) -> Option<&str> {
    let mut untagged = None;

    for caps in FENCED_BLOCK.captures_iter(text) {
        let tag = caps.get(1).map_or("", |m| m.as_str());
        let Some(body) = caps.get(2) else { continue };
        let body = body.as_str().trim();
        if body.is_empty() {
            continue;
        }

        if tag.eq_ignore_ascii_case("json") {
            return Some(body);
        }
        if tag.is_empty() && untagged.is_none() && (body.starts_with('{') || body.starts_with('['))
        {
            untagged = Some(body);
        }
    }

    untagged
}

// ---------------------------------------------------------------------------
// Phase 2: balanced delimiter scan
// ---------------------------------------------------------------------------

/// First balanced span that parses as JSON; otherwise the first balanced span.
fn balanced_json(text: &str) -> Option<&str> {
    let mut ends: HashMap<usize, Option<usize>> = HashMap::new();
    let mut first_balanced = None;

    for (start, ch) in text.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        if !ends.contains_key(&start) {
            scan_from(text, start, &mut ends);
        }
        let Some(Some(end)) = ends.get(&start).copied() else {
            continue;
        };
        let span = &text[start..end];
        if serde_json::from_str::<serde_json::Value>(span).is_ok() {
            return Some(span);
        }
        first_balanced.get_or_insert(span);
    }

    first_balanced
}

/// Scan from the delimiter at `start`, recording in `ends` the byte offset
/// just past the closer of every delimiter opened outside a string, or
/// `None` when it is never closed or a mismatched closer cuts it off.
fn scan_from(text: &str, start: usize, ends: &mut HashMap<usize, Option<usize>>) {
    let mut open: Vec<(usize, char)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        let at = start + offset;
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => open.push((at, '}')),
            '[' => open.push((at, ']')),
            '}' | ']' => match open.pop() {
                Some((pos, closer)) if closer == ch => {
                    ends.insert(pos, Some(at + ch.len_utf8()));
                    if open.is_empty() {
                        return;
                    }
                }
                Some((pos, _)) => {
                    ends.insert(pos, None);
                    break;
                }
                None => break,
            },
            _ => {}
        }
    }

    for (pos, _) in open {
        ends.insert(pos, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn prefers_json_fence() {
        let text = "Voici:\n```json\n{\"a\": 1}\n```\nand {\"b\": 2}";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn accepts_untagged_fence_holding_json() {
        let text = "```\n[1, 2]\n```";
        assert_eq!(extract_json(text), Some("[1, 2]"));
    }

    #[test]
    fn ignores_non_json_fence() {
        let text = "```python\nprint('x')\n```\nresult: {\"ok\": true}";
        assert_eq!(extract_json(text), Some("{\"ok\": true}"));
    }

    #[test]
    fn skips_prose_braces_before_real_value() {
        let text = "Use {placeholders} like this: {\"keyword\": \"a}b\", \"n\": [1, {\"x\": 2}]} done";
        let span = extract_json(text).expect("span");
        let value: Value = serde_json::from_str(span).expect("parse");
        assert_eq!(value, json!({"keyword": "a}b", "n": [1, {"x": 2}]}));
    }

    #[test]
    fn embedded_values_round_trip() {
        let values = [
            json!({"h1": "Titre é", "sections": [{"id": "s1", "note": "quote \" inside"}]}),
            json!([{"url": "https://x.fr/a"}, {"url": "https://x.fr/b"}]),
            json!({"empty": {}, "list": []}),
        ];
        for value in values {
            let encoded = serde_json::to_string_pretty(&value).expect("encode");
            for wrapped in [
                format!("Sure! Here it is:\n{encoded}\nHope this helps."),
                format!("```json\n{encoded}\n```"),
            ] {
                let span = extract_json(&wrapped).expect("span");
                let back: Value = serde_json::from_str(span).expect("parse");
                assert_eq!(back, value);
            }
        }
    }

    #[test]
    fn no_json_and_malformed_are_distinct() {
        let err = parse_structured::<Value>("no structure here").unwrap_err();
        assert!(matches!(err, StructuredError::NoJsonFound { .. }));

        let err = parse_structured::<Value>("```json\n{\"a\": }\n```").unwrap_err();
        assert!(matches!(err, StructuredError::Malformed { .. }));
    }

    #[test]
    fn unbalanced_text_yields_nothing() {
        assert_eq!(extract_json("{\"a\": [1, 2}"), None);
        assert_eq!(extract_json("just ] and } noise"), None);
    }

    #[test]
    fn nested_value_inside_invalid_span_is_found() {
        let text = "{ note: {\"a\": 1} }";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn many_unclosed_braces_before_value() {
        let mut text = "{".repeat(20_000);
        text.push_str(" then ] and finally {\"ok\": true}");
        assert_eq!(extract_json(&text), Some("{\"ok\": true}"));

        let noise = "{ [".repeat(10_000);
        assert_eq!(extract_json(&noise), None);
    }

    #[test]
    fn typed_parse() {
        #[derive(serde::Deserialize)]
        struct Out {
            keyword: String,
        }
        let out: Out = parse_structured("ok {\"keyword\": \"robot\"}").expect("parse");
        assert_eq!(out.keyword, "robot");
    }
}
