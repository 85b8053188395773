//! Console output for `dharvest check` and `dharvest run`.
//!
//! The end-of-run report prints what the run found and where it was
//! written: date range, keyword counts (including keywords that were
//! skipped), a preview of the first records, and the export paths. The plan
//! printed by `check` shows what a run would do. Both go to stdout.

use std::io::{self, Write};

use anyhow::Result;

use crate::config::Config;
use crate::export::{ExportReport, ExportStatus, TableOutcome};
use crate::harvest::{HarvestOutcome, HarvestPlan};
use crate::progress::{format_number, truncate_chars};

/// Number of records shown in the preview.
pub const PREVIEW_LEN: usize = 5;

/// Print the search plan of `config` to stdout.
pub fn print_plan(config: &Config) -> Result<()> {
    let stdout = io::stdout();
    write_plan(&mut stdout.lock(), config)
}

pub fn write_plan<W: Write>(out: &mut W, config: &Config) -> Result<()> {
    let plan = HarvestPlan::from_config(config)?;
    let search = &plan.search;

    writeln!(out, "site:      {}", plan.url)?;
    writeln!(
        out,
        "dates:     {} to {}",
        search.start_date(),
        search.end_date()
    )?;
    writeln!(
        out,
        "keywords:  {} ({})",
        search.keywords().join(", "),
        search.keywords().len()
    )?;
    writeln!(
        out,
        "form:      title {}, begin {}, end {}, submit {}",
        plan.form.title, plan.form.begin_date, plan.form.end_date, plan.form.submit
    )?;
    writeln!(
        out,
        "table:     rows {}, cells {}, link {}",
        plan.table.row, plan.table.cell, plan.table.link
    )?;
    writeln!(
        out,
        "timing:    wait {}s, page settle {}s, search settle {}s",
        plan.element_timeout.as_secs(),
        plan.page_settle.as_secs(),
        plan.search_settle.as_secs()
    )?;
    writeln!(
        out,
        "browser:   {}",
        if config.browser.headless {
            "headless"
        } else {
            "windowed"
        }
    )?;
    writeln!(out, "records:   {}", config.output.records_path().display())?;
    writeln!(out, "run log:   {}", config.output.log_path().display())?;
    Ok(())
}

/// Print the report for a finished run to stdout.
pub fn print_report(outcome: &HarvestOutcome, export: &ExportReport) {
    let stdout = io::stdout();
    let _ = write_report(&mut stdout.lock(), outcome, export);
}

/// Render the report into any writer.
pub fn write_report<W: Write>(
    out: &mut W,
    outcome: &HarvestOutcome,
    export: &ExportReport,
) -> io::Result<()> {
    let summary = &outcome.summary;
    let rule = "=".repeat(70);

    writeln!(out, "{}", rule)?;
    writeln!(out, "Search summary")?;
    writeln!(out, "{}", rule)?;
    writeln!(
        out,
        "  Date range:  {} to {}",
        summary.start_date, summary.end_date
    )?;
    writeln!(out, "  Keywords:    {}", summary.keywords.len())?;
    writeln!(
        out,
        "  Documents:   {}",
        format_number(summary.total_results as u64)
    )?;

    writeln!(out)?;
    writeln!(out, "  {:<24} {:>8}", "KEYWORD", "RESULTS")?;
    writeln!(out, "  {}", "-".repeat(33))?;
    for (keyword, count) in &summary.results_per_keyword {
        writeln!(out, "  {:<24} {:>8}", keyword, count)?;
    }
    for skipped in &outcome.skipped {
        writeln!(
            out,
            "  {:<24} {:>8}   ({}: {})",
            skipped.keyword, "skipped", skipped.stage, skipped.reason
        )?;
    }

    if outcome.is_empty() {
        writeln!(out)?;
        writeln!(out, "No results found.")?;
        writeln!(out, "  Possible causes:")?;
        writeln!(out, "  - no announcements matched the keywords in this date range")?;
        writeln!(out, "  - the site's form or table markup changed (check [site.selectors])")?;
    } else {
        writeln!(out)?;
        writeln!(out, "  First {} results:", PREVIEW_LEN.min(outcome.records.len()))?;
        writeln!(out, "  {}", "-".repeat(68))?;
        for (idx, record) in outcome.records.iter().take(PREVIEW_LEN).enumerate() {
            writeln!(
                out,
                "  {}. [{}] {}",
                idx + 1,
                record.keyword(),
                truncate_chars(record.title(), 50)
            )?;
            writeln!(
                out,
                "     date: {} | company: {}",
                record.date(),
                record.company()
            )?;
            writeln!(out, "     file: {}", record.document_filename())?;
        }
    }

    writeln!(out)?;
    match &export.table {
        TableOutcome::Written(path) => writeln!(out, "  Records:     {}", path.display())?,
        TableOutcome::Failed(e) => writeln!(out, "  Records:     FAILED ({})", e)?,
        TableOutcome::Skipped => {}
    }
    match &export.log {
        Ok(path) => writeln!(out, "  Run log:     {}", path.display())?,
        Err(e) => writeln!(out, "  Run log:     FAILED ({})", e)?,
    }

    let status = match export.status() {
        ExportStatus::Complete => "ok",
        ExportStatus::Partial => "partial (one output failed)",
        ExportStatus::Failed => "failed",
        ExportStatus::NoResults => "no results",
    };
    writeln!(out, "{}", rule)?;
    writeln!(out, "{}", status)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::{Harvest, KeywordOutcome, Stage};
    use crate::models::{DisclosureRecord, RunSummary, SearchConfig};
    use chrono::Local;
    use std::path::PathBuf;

    fn outcome(with_records: bool) -> HarvestOutcome {
        let cfg = SearchConfig::new(
            "2025/05/01",
            "2025/12/03",
            vec!["供股".into(), "全購".into()],
        )
        .unwrap();
        let records = if with_records {
            vec![DisclosureRecord::new(
                "供股",
                "建議按於記錄日期每持有兩股現有股份獲發一股供股股份之基準進行供股",
                "12/06/2025",
                "某某控股",
                "https://example.com/x/2025061200456_c.pdf",
                Local::now(),
            )
            .unwrap()]
        } else {
            vec![]
        };
        Harvest::default()
            .fold("供股", KeywordOutcome::Completed(records))
            .fold(
                "全購",
                KeywordOutcome::Skipped {
                    stage: Stage::Submit,
                    reason: "not clickable".into(),
                },
            )
            .finish(RunSummary::started(&cfg, Local::now()))
    }

    fn render(outcome: &HarvestOutcome, export: &ExportReport) -> String {
        let mut buf = Vec::new();
        write_report(&mut buf, outcome, export).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn report_lists_counts_skips_and_preview() {
        let export = ExportReport {
            table: TableOutcome::Written(PathBuf::from("out/pdf_links.csv")),
            log: Ok(PathBuf::from("out/search_log.json")),
        };
        let text = render(&outcome(true), &export);
        assert!(text.contains("Documents:   1"));
        assert!(text.contains("skipped"));
        assert!(text.contains("submit: not clickable"));
        assert!(text.contains("2025061200456_c.pdf"));
        assert!(text.contains("out/pdf_links.csv"));
        assert!(text.trim_end().ends_with("ok"));
    }

    #[test]
    fn plan_shows_selectors_and_paths() {
        let mut buf = Vec::new();
        write_plan(&mut buf, &Config::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("dates:     2025/05/01 to 2025/12/03"));
        assert!(text.contains("供股, 配股, 股權集中, 易手, 全購 (5)"));
        assert!(text.contains("submit name=btnSearch"));
        assert!(text.contains("rows tag=tr"));
        assert!(text.contains("pdf_links.csv"));
    }

    #[test]
    fn report_explains_empty_run() {
        let export = ExportReport {
            table: TableOutcome::Skipped,
            log: Ok(PathBuf::from("out/search_log.json")),
        };
        let text = render(&outcome(false), &export);
        assert!(text.contains("No results found."));
        assert!(!text.contains("Records:"));
        assert!(text.trim_end().ends_with("no results"));
    }
}
