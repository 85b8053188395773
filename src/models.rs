//! Core data models used throughout the harvest pipeline.
//!
//! [`SearchConfig`] is the immutable input of one run, [`DisclosureRecord`]
//! is one extracted result row, and [`RunSummary`] is the aggregate metadata
//! persisted as the run log.

use anyhow::{bail, Result};
use chrono::{DateTime, Local, NaiveDate};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Date format accepted by the portal's date fields.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Format used for capture and search timestamps in every output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Immutable per-run search configuration.
///
/// Dates are validated on construction but kept as the literal strings the
/// caller supplied; they are typed into the form verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    start_date: String,
    end_date: String,
    keywords: Vec<String>,
}

impl SearchConfig {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        keywords: Vec<String>,
    ) -> Result<Self> {
        let start_date = start_date.into();
        let end_date = end_date.into();

        let start = parse_date("start_date", &start_date)?;
        let end = parse_date("end_date", &end_date)?;
        if start > end {
            bail!(
                "start_date ({}) must not be after end_date ({})",
                start_date,
                end_date
            );
        }

        if keywords.is_empty() {
            bail!("at least one keyword is required");
        }
        if let Some(pos) = keywords.iter().position(|k| k.trim().is_empty()) {
            bail!("keyword #{} is blank", pos + 1);
        }

        Ok(Self {
            start_date,
            end_date,
            keywords,
        })
    }

    pub fn start_date(&self) -> &str {
        &self.start_date
    }

    pub fn end_date(&self) -> &str {
        &self.end_date
    }

    /// Keywords in search order. May contain duplicates.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    // chrono accepts unpadded months/days; the portal expects the padded form
    if value.len() != 10 {
        bail!("{} must be YYYY/MM/DD, got '{}'", name, value);
    }
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Ok(date),
        Err(_) => bail!("{} must be YYYY/MM/DD, got '{}'", name, value),
    }
}

/// One matched result row carrying a document link.
///
/// A record cannot exist without a non-empty `document_link`:
/// [`DisclosureRecord::new`] returns `None` for an empty link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosureRecord {
    keyword: String,
    title: String,
    date: String,
    company: String,
    document_filename: String,
    document_link: String,
    captured_at: DateTime<Local>,
}

impl DisclosureRecord {
    pub fn new(
        keyword: impl Into<String>,
        title: impl Into<String>,
        date: impl Into<String>,
        company: impl Into<String>,
        document_link: impl Into<String>,
        captured_at: DateTime<Local>,
    ) -> Option<Self> {
        let document_link = document_link.into();
        if document_link.is_empty() {
            return None;
        }
        Some(Self {
            keyword: keyword.into(),
            title: title.into(),
            date: date.into(),
            company: company.into(),
            document_filename: filename_from_link(&document_link).to_string(),
            document_link,
            captured_at,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn document_filename(&self) -> &str {
        &self.document_filename
    }

    pub fn document_link(&self) -> &str {
        &self.document_link
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }
}

/// Substring after the final `/` of a link (the whole link if it has none).
pub fn filename_from_link(link: &str) -> &str {
    match link.rfind('/') {
        Some(idx) => &link[idx + 1..],
        None => link,
    }
}

/// Aggregate metadata for one run, serialized as the run log.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub start_date: String,
    pub end_date: String,
    pub keywords: Vec<String>,
    #[serde(rename = "search_time", serialize_with = "serialize_timestamp")]
    pub searched_at: DateTime<Local>,
    pub total_results: usize,
    /// Keyword → record count, in first-search order. Keywords abandoned by
    /// a fatal form failure are absent.
    #[serde(rename = "keywords_results")]
    pub results_per_keyword: IndexMap<String, usize>,
}

impl RunSummary {
    /// Summary for a run that has not processed any keyword yet.
    pub fn started(config: &SearchConfig, searched_at: DateTime<Local>) -> Self {
        Self {
            start_date: config.start_date().to_string(),
            end_date: config.end_date().to_string(),
            keywords: config.keywords().to_vec(),
            searched_at,
            total_results: 0,
            results_per_keyword: IndexMap::new(),
        }
    }
}

fn serialize_timestamp<S: Serializer>(
    ts: &DateTime<Local>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
}
