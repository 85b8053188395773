//! Export harvested records and the run log.
//!
//! Produces two files: a CSV table of every [`DisclosureRecord`] (UTF-8 with
//! BOM so spreadsheet tools pick up the Chinese headers) and a pretty-printed
//! JSON run log holding the [`RunSummary`]. The two writes are independent;
//! one failing never prevents the other from being attempted.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::error::ExportError;
use crate::models::{DisclosureRecord, RunSummary, TIMESTAMP_FORMAT};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One CSV line. Column names are part of the output contract.
#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "搜索關鍵詞")]
    keyword: &'a str,
    #[serde(rename = "公告標題")]
    title: &'a str,
    #[serde(rename = "公告日期")]
    date: &'a str,
    #[serde(rename = "公司名稱")]
    company: &'a str,
    #[serde(rename = "PDF 檔名")]
    document_filename: &'a str,
    #[serde(rename = "PDF 鏈接")]
    document_link: &'a str,
    #[serde(rename = "搜索時間")]
    captured_at: String,
}

impl<'a> From<&'a DisclosureRecord> for CsvRow<'a> {
    fn from(r: &'a DisclosureRecord) -> Self {
        Self {
            keyword: r.keyword(),
            title: r.title(),
            date: r.date(),
            company: r.company(),
            document_filename: r.document_filename(),
            document_link: r.document_link(),
            captured_at: r.captured_at().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Durable destination for the export.
pub trait ExportSink {
    /// Write the record table; returns where it went.
    fn write_records(&self, records: &[DisclosureRecord]) -> Result<PathBuf, ExportError>;

    /// Write the run log; returns where it went.
    fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, ExportError>;
}

/// Writes the CSV and JSON files under the configured output directory.
pub struct FileSink {
    records_path: PathBuf,
    log_path: PathBuf,
}

impl FileSink {
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            records_path: output.records_path(),
            log_path: output.log_path(),
        }
    }
}

impl ExportSink for FileSink {
    fn write_records(&self, records: &[DisclosureRecord]) -> Result<PathBuf, ExportError> {
        let path = &self.records_path;
        ensure_parent(path)?;

        let mut file = File::create(path).map_err(|e| ExportError::io(path, e))?;
        file.write_all(UTF8_BOM)
            .map_err(|e| ExportError::io(path, e))?;

        let mut writer = csv::Writer::from_writer(BufWriter::new(file));
        for record in records {
            writer.serialize(CsvRow::from(record))?;
        }
        writer.flush().map_err(|e| ExportError::io(path, e))?;

        Ok(path.clone())
    }

    fn write_summary(&self, summary: &RunSummary) -> Result<PathBuf, ExportError> {
        let path = &self.log_path;
        ensure_parent(path)?;

        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(path, json).map_err(|e| ExportError::io(path, e))?;

        Ok(path.clone())
    }
}

fn ensure_parent(path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
        }
    }
    Ok(())
}

/// What happened to the record table.
#[derive(Debug)]
pub enum TableOutcome {
    Written(PathBuf),
    /// Nothing to write: the run found no records.
    Skipped,
    Failed(ExportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    /// Both files written.
    Complete,
    /// Exactly one of the two files written.
    Partial,
    /// Nothing durable written: both files failed, or there were no
    /// records and the run log failed.
    Failed,
    /// No records; the table was not written, the run log was.
    NoResults,
}

#[derive(Debug)]
pub struct ExportReport {
    pub table: TableOutcome,
    pub log: Result<PathBuf, ExportError>,
}

impl ExportReport {
    pub fn status(&self) -> ExportStatus {
        match (&self.table, &self.log) {
            (TableOutcome::Skipped, Ok(_)) => ExportStatus::NoResults,
            (TableOutcome::Skipped, Err(_)) => ExportStatus::Failed,
            (TableOutcome::Written(_), Ok(_)) => ExportStatus::Complete,
            (TableOutcome::Failed(_), Err(_)) => ExportStatus::Failed,
            _ => ExportStatus::Partial,
        }
    }
}

/// Write `records` and `summary` to `sink`.
///
/// With no records the table is skipped rather than written empty; the run
/// log is always attempted.
pub fn export(
    records: &[DisclosureRecord],
    summary: &RunSummary,
    sink: &dyn ExportSink,
) -> ExportReport {
    let table = if records.is_empty() {
        info!("no records, skipping table export");
        TableOutcome::Skipped
    } else {
        match sink.write_records(records) {
            Ok(path) => {
                info!(path = %path.display(), rows = records.len(), "records exported");
                TableOutcome::Written(path)
            }
            Err(e) => {
                warn!("failed to export records: {}", e);
                TableOutcome::Failed(e)
            }
        }
    };

    let log = sink.write_summary(summary);
    match &log {
        Ok(path) => info!(path = %path.display(), "run log written"),
        Err(e) => warn!("failed to write run log: {}", e),
    }

    ExportReport { table, log }
}
