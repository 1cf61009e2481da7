//! Cleanup passes applied to the article Markdown.
//!
//! Each pass is a function `&str -> String` applied in sequence. Fenced code
//! is left untouched by the heading pass.

use std::sync::LazyLock;

use regex::Regex;

/// Run every cleanup pass on article Markdown.
pub fn run_pipeline(md: &str) -> String {
    let mut result = normalize_line_endings(md);

    result = normalize_headings(&result);
    result = clean_blank_lines(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(md: &str) -> String {
    md.replace("\r\n", "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Headings
// ---------------------------------------------------------------------------

/// Keep a single H1 and put exactly one space after the hashes.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").expect("valid regex"));

    let mut h1_count = 0;
    let mut in_code_block = false;
    let mut lines: Vec<String> = Vec::new();

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            lines.push(line.to_string());
            continue;
        }

        let Some(caps) = H_RE.captures(line).filter(|_| !in_code_block) else {
            lines.push(line.to_string());
            continue;
        };

        let hashes = &caps[1];
        let text = &caps[2];
        if hashes == "#" {
            h1_count += 1;
            if h1_count > 1 {
                lines.push(format!("## {text}"));
                continue;
            }
        }
        lines.push(format!("{hashes} {text}"));
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*){2,}\n").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Trailing whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line, keeping Markdown hard breaks.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| {
            let trimmed = line.trim_end();
            if line.ends_with("  ") && !trimmed.is_empty() {
                format!("{trimmed}  ")
            } else {
                trimmed.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 5: Trailing newline
// ---------------------------------------------------------------------------

/// Ensure the text ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
