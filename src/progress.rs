//! Harvest progress reporting.
//!
//! Reports observable progress during `dharvest run` so the operator sees
//! which keyword is being searched and how many documents it produced.
//! Progress is emitted on **stderr** so stdout stays reserved for the final
//! report.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum HarvestEvent {
    /// Session is up and the portal is loaded.
    Started { url: String, keywords: usize },
    /// A keyword pass is starting (`index` is 1-based).
    KeywordStarted {
        index: usize,
        total: usize,
        keyword: String,
    },
    /// The date range could not be applied; the search continues.
    DateWarning { keyword: String, reason: String },
    /// The search form was submitted.
    Submitted { keyword: String },
    /// A record was captured (`n` is 1-based within the keyword).
    RecordCaptured {
        keyword: String,
        n: usize,
        title: String,
    },
    /// A keyword pass completed with `count` records.
    KeywordFinished { keyword: String, count: usize },
    /// A keyword pass was abandoned at `stage`.
    KeywordSkipped {
        keyword: String,
        stage: String,
        reason: String,
    },
}

/// Reports harvest progress. Implementations write to stderr (human or JSON).
pub trait HarvestProgressReporter: Send + Sync {
    fn report(&self, event: HarvestEvent);
}

/// Whether a captured record should be surfaced: the first, then every 5th.
pub fn should_sample(n: usize) -> bool {
    n == 1 || n % 5 == 0
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl HarvestProgressReporter for StderrProgress {
    fn report(&self, event: HarvestEvent) {
        let line = match &event {
            HarvestEvent::Started { url, keywords } => {
                format!("harvest {}  {} keywords\n", url, keywords)
            }
            HarvestEvent::KeywordStarted {
                index,
                total,
                keyword,
            } => format!("[{}/{}] search 《{}》\n", index, total, keyword),
            HarvestEvent::DateWarning { keyword, reason } => {
                format!("  warning  《{}》 date range not set: {}\n", keyword, reason)
            }
            HarvestEvent::Submitted { .. } => "  submitted, waiting for results...\n".to_string(),
            HarvestEvent::RecordCaptured { n, title, .. } => {
                if !should_sample(*n) {
                    return;
                }
                format!("    [{}] {}\n", n, truncate_chars(title, 40))
            }
            HarvestEvent::KeywordFinished { keyword, count } => {
                format!("  《{}》 {} documents\n", keyword, format_number(*count as u64))
            }
            HarvestEvent::KeywordSkipped {
                keyword,
                stage,
                reason,
            } => format!("  skipped 《{}》 at {}: {}\n", keyword, stage, reason),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl HarvestProgressReporter for JsonProgress {
    fn report(&self, event: HarvestEvent) {
        let obj = match &event {
            HarvestEvent::Started { url, keywords } => serde_json::json!({
                "event": "started",
                "url": url,
                "keywords": keywords
            }),
            HarvestEvent::KeywordStarted {
                index,
                total,
                keyword,
            } => serde_json::json!({
                "event": "keyword_started",
                "keyword": keyword,
                "n": index,
                "total": total
            }),
            HarvestEvent::DateWarning { keyword, reason } => serde_json::json!({
                "event": "date_warning",
                "keyword": keyword,
                "reason": reason
            }),
            HarvestEvent::Submitted { keyword } => serde_json::json!({
                "event": "submitted",
                "keyword": keyword
            }),
            HarvestEvent::RecordCaptured { keyword, n, title } => serde_json::json!({
                "event": "record",
                "keyword": keyword,
                "n": n,
                "title": title
            }),
            HarvestEvent::KeywordFinished { keyword, count } => serde_json::json!({
                "event": "keyword_finished",
                "keyword": keyword,
                "count": count
            }),
            HarvestEvent::KeywordSkipped {
                keyword,
                stage,
                reason,
            } => serde_json::json!({
                "event": "keyword_skipped",
                "keyword": keyword,
                "stage": stage,
                "reason": reason
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl HarvestProgressReporter for NoProgress {
    fn report(&self, _event: HarvestEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// First `max` characters of `s`, with `...` appended when cut.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn HarvestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
