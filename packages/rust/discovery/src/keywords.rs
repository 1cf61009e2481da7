//! Keyword sheet ingestion.
//!
//! Accepts exports from the usual keyword research tools: column names vary,
//! so each canonical column is matched through a list of aliases. Files may
//! be UTF-8 (with or without BOM) or Windows-1252/Latin-1, and delimited by
//! comma, semicolon or tab.

use seoforge_shared::{KeywordCandidate, Result, SeoForgeError};
use tracing::{debug, info, instrument};

const KEYWORD_ALIASES: &[&str] = &[
    "keyword",
    "mot-clé",
    "mot clé",
    "mots-clés",
    "query",
    "term",
    "phrase",
    "requête",
];
const VOLUME_ALIASES: &[&str] = &[
    "volume",
    "search volume",
    "monthly searches",
    "avg. monthly searches",
    "searches",
];
const DIFFICULTY_ALIASES: &[&str] = &[
    "difficulty",
    "kd",
    "keyword difficulty",
    "concurrence",
    "competition",
    "score",
];
const CPC_ALIASES: &[&str] = &["cpc", "cost per click", "coût par clic"];

/// Keywords this short are export noise.
const MIN_KEYWORD_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Keyword,
    Volume,
    Difficulty,
    Cpc,
}

const CANONICAL: [(Column, &[&str]); 4] = [
    (Column::Keyword, KEYWORD_ALIASES),
    (Column::Volume, VOLUME_ALIASES),
    (Column::Difficulty, DIFFICULTY_ALIASES),
    (Column::Cpc, CPC_ALIASES),
];

/// Parse a keyword sheet into candidates, in file order.
#[instrument(skip_all, fields(bytes = bytes.len()))]
pub fn parse_keyword_csv(bytes: &[u8]) -> Result<Vec<KeywordCandidate>> {
    let text = decode(bytes);
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| SeoForgeError::parse(format!("keyword sheet header: {e}")))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let rows: Vec<csv::StringRecord> = reader.records().filter_map(|r| r.ok()).collect();

    let mut mapping = map_columns(&headers);
    if !mapping.iter().any(|m| *m == Some(Column::Keyword)) {
        let fallback = first_text_column(&rows, headers.len())
            .ok_or_else(|| SeoForgeError::parse("keyword sheet has no keyword column"))?;
        debug!(column = %headers[fallback], "no keyword column, using first text column");
        mapping[fallback] = Some(Column::Keyword);
    }

    let index_of = |wanted: Column| mapping.iter().position(|m| *m == Some(wanted));
    let keyword_idx = index_of(Column::Keyword)
        .ok_or_else(|| SeoForgeError::parse("keyword sheet has no keyword column"))?;
    let volume_idx = index_of(Column::Volume);
    let difficulty_idx = index_of(Column::Difficulty);
    let cpc_idx = index_of(Column::Cpc);

    let cell = |row: &csv::StringRecord, idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).unwrap_or("").to_string()
    };

    let candidates: Vec<KeywordCandidate> = rows
        .iter()
        .filter_map(|row| {
            let text = row.get(keyword_idx)?.trim().to_string();
            if text.chars().count() < MIN_KEYWORD_CHARS {
                return None;
            }
            Some(KeywordCandidate {
                text,
                volume: parse_count(&cell(row, volume_idx)),
                difficulty: u32::try_from(parse_count(&cell(row, difficulty_idx)))
                    .unwrap_or(u32::MAX),
                cpc: parse_decimal(&cell(row, cpc_idx)),
            })
        })
        .collect();

    if candidates.is_empty() {
        return Err(SeoForgeError::validation(
            "keyword sheet contains no usable keywords",
        ));
    }

    info!(
        candidates = candidates.len(),
        delimiter = %(delimiter as char).escape_default(),
        "keyword sheet parsed"
    );
    Ok(candidates)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// UTF-8 (BOM stripped) when valid, else Windows-1252.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| cp1252_char(b)).collect(),
    }
}

fn cp1252_char(byte: u8) -> char {
    match byte {
        0x80 => '€',
        0x85 => '…',
        0x8C => 'Œ',
        0x91 => '‘',
        0x92 => '’',
        0x93 => '“',
        0x94 => '”',
        0x96 => '–',
        0x97 => '—',
        0x9C => 'œ',
        other => other as char,
    }
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| header.matches(*d as char).count())
        .filter(|d| header.contains(*d as char))
        .unwrap_or(b',')
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Each header takes the first canonical column it matches that is still free.
fn map_columns(headers: &[String]) -> Vec<Option<Column>> {
    let mut taken: Vec<Column> = Vec::new();
    headers
        .iter()
        .map(|header| {
            let found = CANONICAL
                .iter()
                .find(|(col, aliases)| {
                    !taken.contains(col) && aliases.iter().any(|a| header.contains(a))
                })
                .map(|(col, _)| *col);
            if let Some(col) = found {
                taken.push(col);
            }
            found
        })
        .collect()
}

fn first_text_column(rows: &[csv::StringRecord], width: usize) -> Option<usize> {
    (0..width).find(|&idx| {
        let values: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.get(idx))
            .filter(|v| !v.is_empty())
            .collect();
        let textual = values
            .iter()
            .filter(|v| v.parse::<f64>().is_err())
            .count();
        !values.is_empty() && textual * 2 > values.len()
    })
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

fn parse_count(raw: &str) -> u64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f > 0.0)
        .map_or(0, |f| f.round() as u64)
}

fn parse_decimal(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.trim_start_matches(['$', '€']).trim_end_matches(['$', '€']);
    let normalized = if cleaned.contains('.') {
        cleaned.replace(',', "")
    } else {
        cleaned.replace(',', ".")
    };
    normalized
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .unwrap_or(0.0)
}
