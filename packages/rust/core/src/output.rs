//! Article persistence and run history.
//!
//! Each run writes `{YYYYmmdd_HHMM}_{slug}.md` and `.html` into the output
//! directory. Both files are staged as hidden temp files and only then
//! renamed into place, so a failed write leaves neither behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use seoforge_markdown::count_words;
use seoforge_shared::{GeneratedArticle, Result, RunId, SeoForgeError};

/// What a completed run left on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub keyword: String,
    pub slug: String,
    pub generated_at: DateTime<Utc>,
    pub markdown_path: PathBuf,
    pub html_path: PathBuf,
    pub target_words: u32,
    pub word_count: usize,
    pub markdown_sha256: String,
    pub html_sha256: String,
}

/// Runs completed in this process, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    records: Vec<RunRecord>,
}

impl RunHistory {
    pub fn push(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn latest(&self) -> Option<&RunRecord> {
        self.records.last()
    }
}

/// File name stem shared by the `.md` and `.html` outputs.
pub fn output_stem(generated_at: DateTime<Utc>, slug: &str) -> String {
    let slug = if slug.is_empty() { "article" } else { slug };
    format!("{}_{slug}", generated_at.format("%Y%m%d_%H%M"))
}

/// Write both article files and describe the result.
#[instrument(skip_all, fields(dir = %dir.display(), slug = %article.slug))]
pub fn write_article(
    dir: &Path,
    article: &GeneratedArticle,
    target_words: u32,
    run_id: RunId,
) -> Result<RunRecord> {
    std::fs::create_dir_all(dir).map_err(|e| SeoForgeError::io(dir, e))?;

    let stem = output_stem(article.generated_at, &article.slug);
    let markdown_path = dir.join(format!("{stem}.md"));
    let html_path = dir.join(format!("{stem}.html"));

    let markdown = stage(&markdown_path, &article.markdown)?;
    let html = match stage(&html_path, &article.html) {
        Ok(html) => html,
        Err(e) => {
            discard(&markdown.temp);
            return Err(e);
        }
    };

    markdown.commit().inspect_err(|_| discard(&html.temp))?;
    if let Err(e) = html.commit() {
        discard(&markdown_path);
        return Err(e);
    }
    let (markdown_sha256, html_sha256) = (markdown.sha256, html.sha256);

    let record = RunRecord {
        run_id,
        keyword: article.keyword.clone(),
        slug: article.slug.clone(),
        generated_at: article.generated_at,
        markdown_path,
        html_path,
        target_words,
        word_count: count_words(&article.markdown),
        markdown_sha256,
        html_sha256,
    };
    info!(
        markdown = %record.markdown_path.display(),
        words = record.word_count,
        "article saved"
    );
    Ok(record)
}

/// A file written to its temp path, waiting to be renamed into place.
struct Staged {
    temp: PathBuf,
    target: PathBuf,
    sha256: String,
}

impl Staged {
    fn commit(&self) -> Result<()> {
        std::fs::rename(&self.temp, &self.target).map_err(|e| {
            discard(&self.temp);
            SeoForgeError::io(&self.target, e)
        })?;
        debug!(file = %self.target.display(), "wrote file");
        Ok(())
    }
}

/// Write `content` next to `target` as `.{name}.tmp` and hash it.
fn stage(target: &Path, content: &str) -> Result<Staged> {
    let file_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SeoForgeError::validation(format!("invalid output path {target:?}")))?;
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| SeoForgeError::io(&temp, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(Staged {
        temp,
        target: target.to_path_buf(),
        sha256: format!("{:x}", hasher.finalize()),
    })
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(file = %path.display(), error = %e, "could not remove partial output");
    }
}

// ---------------------------------------------------------------------------
// History scan
// ---------------------------------------------------------------------------

/// One prior run found in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub stem: String,
    pub generated_at: NaiveDateTime,
    pub slug: String,
    pub markdown: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

/// List prior runs in `dir`, newest first. A missing directory is empty.
pub fn list_history(dir: &Path) -> Result<Vec<HistoryEntry>> {
    static STEM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\d{8}_\d{4})_(.+)$").expect("valid regex"));

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SeoForgeError::io(dir, e)),
    };

    let mut by_stem: BTreeMap<String, HistoryEntry> = BTreeMap::new();
    for entry in entries {
        let path = entry.map_err(|e| SeoForgeError::io(dir, e))?.path();
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            continue;
        };
        if ext != "md" && ext != "html" {
            continue;
        }
        let Some(caps) = STEM_RE.captures(stem) else {
            continue;
        };
        let Ok(generated_at) = NaiveDateTime::parse_from_str(&format!("{}00", &caps[1]), "%Y%m%d_%H%M%S")
        else {
            continue;
        };

        let item = by_stem.entry(stem.to_string()).or_insert_with(|| HistoryEntry {
            stem: stem.to_string(),
            generated_at,
            slug: caps[2].to_string(),
            markdown: None,
            html: None,
        });
        if ext == "md" {
            item.markdown = Some(path.clone());
        } else {
            item.html = Some(path.clone());
        }
    }

    let mut history: Vec<HistoryEntry> = by_stem.into_values().collect();
    history.sort_by(|a, b| {
        b.generated_at
            .cmp(&a.generated_at)
            .then_with(|| a.slug.cmp(&b.slug))
    });
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(slug: &str) -> GeneratedArticle {
        GeneratedArticle {
            markdown: "---\ntitle: \"t\"\n---\n# Titre\n\nUn deux trois.\n".into(),
            html: "<article>\n<h1>Titre</h1>\n</article>".into(),
            raw_model_output: String::new(),
            keyword: "meilleur aspirateur robot".into(),
            slug: slug.into(),
            generated_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 12).unwrap(),
        }
    }

    #[test]
    fn stem_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap();
        assert_eq!(output_stem(at, "robot"), "20250314_0905_robot");
        assert_eq!(output_stem(at, ""), "20250314_0905_article");
    }

    #[test]
    fn writes_both_files_with_hashes() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested/output");

        let record = write_article(&out, &article("meilleur-aspirateur-robot"), 2000, RunId::new()).unwrap();

        assert_eq!(
            record.markdown_path,
            out.join("20250314_0930_meilleur-aspirateur-robot.md")
        );
        let md = std::fs::read_to_string(&record.markdown_path).unwrap();
        assert!(md.contains("Un deux trois."));
        assert!(record.html_path.exists());
        assert_eq!(record.markdown_sha256.len(), 64);
        assert_ne!(record.markdown_sha256, record.html_sha256);
        assert_eq!(record.target_words, 2000);
        assert!(record.word_count >= 3);

        let leftovers: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_html_write_leaves_no_markdown() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        // A directory squatting on the HTML path makes its rename fail.
        std::fs::create_dir(dir.join("20250314_0930_robot.html")).unwrap();

        let err = write_article(dir, &article("robot"), 2000, RunId::new());

        assert!(err.is_err());
        assert!(!dir.join("20250314_0930_robot.md").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn history_groups_pairs_newest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        for name in [
            "20250101_1000_ancien.md",
            "20250101_1000_ancien.html",
            "20250314_0930_robot.md",
            "20250314_0930_robot.html",
            "20250201_0800_seul.md",
            "notes.md",
            "20250314_0930_robot.txt",
        ] {
            std::fs::write(dir.join(name), "x").unwrap();
        }

        let history = list_history(dir).unwrap();

        let slugs: Vec<&str> = history.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["robot", "seul", "ancien"]);
        assert!(history[0].html.is_some());
        assert!(history[1].html.is_none());
        assert_eq!(history[0].generated_at.format("%Y-%m-%d %H:%M").to_string(), "2025-03-14 09:30");
    }

    #[test]
    fn history_of_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_history(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn run_history_tracks_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let mut history = RunHistory::default();
        assert!(history.latest().is_none());

        let first = write_article(tmp.path(), &article("a"), 1000, RunId::new()).unwrap();
        let second = write_article(tmp.path(), &article("b"), 1000, RunId::new()).unwrap();
        history.push(first);
        history.push(second.clone());

        assert_eq!(history.records().len(), 2);
        assert_eq!(history.latest(), Some(&second));
    }
}
