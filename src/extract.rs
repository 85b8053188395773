//! Results table extraction.
//!
//! Reads the rendered results table into [`DisclosureRecord`]s. The first
//! row is the header. Every other row is snapshotted (cell texts plus the
//! link in its last cell) and passed through [`parse_row`], which keeps only
//! rows with at least [`MIN_CELLS`] cells and a non-empty link.
//!
//! Extraction never fails: a table that does not appear yields no records,
//! and a row that cannot be read is skipped without trace in the output.

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::config::SelectorsConfig;
use crate::models::DisclosureRecord;
use crate::session::{BrowserSession, Locator};

/// Minimum number of cells for a row to be considered a result.
pub const MIN_CELLS: usize = 4;

/// Locators of the results table's parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub row: Locator,
    /// Relative to a row.
    pub cell: Locator,
    /// Relative to the row's last cell.
    pub link: Locator,
}

impl TableLayout {
    pub fn from_selectors(selectors: &SelectorsConfig) -> Self {
        Self {
            row: Locator::selector(&selectors.row),
            cell: Locator::selector(&selectors.cell),
            link: Locator::selector(&selectors.link),
        }
    }
}

impl Default for TableLayout {
    fn default() -> Self {
        Self::from_selectors(&SelectorsConfig::default())
    }
}

/// Plain-data copy of one table row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot {
    /// Text of every cell, in order.
    pub cells: Vec<String>,
    /// `href` of the first link inside the last cell, if any.
    pub link: Option<String>,
}

/// Convert a row snapshot into a record, or `None` if the row does not
/// qualify: fewer than [`MIN_CELLS`] cells, or no usable link.
pub fn parse_row(
    row: &RowSnapshot,
    keyword: &str,
    captured_at: DateTime<Local>,
) -> Option<DisclosureRecord> {
    if row.cells.len() < MIN_CELLS {
        return None;
    }
    let link = row.link.as_deref().map(str::trim).filter(|l| !l.is_empty())?;

    let cell = |idx: usize| row.cells.get(idx).map(|s| s.trim()).unwrap_or_default();

    DisclosureRecord::new(keyword, cell(0), cell(1), cell(2), link, captured_at)
}

/// Read all result rows currently rendered and convert them to records for
/// `keyword`, in document order.
pub async fn extract_records<S: BrowserSession>(
    session: &S,
    table: &TableLayout,
    keyword: &str,
    timeout: Duration,
) -> Vec<DisclosureRecord> {
    if let Err(e) = session.wait_until_present(&table.row, timeout).await {
        warn!(keyword, "no result rows appeared: {}", e);
        return Vec::new();
    }

    let rows = match session.find_elements(&table.row).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(keyword, "failed to list result rows: {}", e);
            return Vec::new();
        }
    };
    debug!(keyword, rows = rows.len(), "result rows found");

    let mut records = Vec::new();
    for row in rows.iter().skip(1) {
        let Some(snapshot) = snapshot_row(session, table, row).await else {
            continue;
        };
        if let Some(record) = parse_row(&snapshot, keyword, Local::now()) {
            records.push(record);
        }
    }
    records
}

/// Read a row into a [`RowSnapshot`]. Returns `None` when the row has too
/// few cells or any of its cells cannot be read.
async fn snapshot_row<S: BrowserSession>(
    session: &S,
    table: &TableLayout,
    row: &S::Element,
) -> Option<RowSnapshot> {
    let cells = session.find_elements_in(row, &table.cell).await.ok()?;
    if cells.len() < MIN_CELLS {
        return None;
    }

    let mut texts = Vec::with_capacity(cells.len());
    for cell in &cells {
        texts.push(session.text(cell).await.ok()?);
    }

    let link = match cells.last() {
        Some(last) => first_link(session, table, last).await,
        None => None,
    };

    Some(RowSnapshot { cells: texts, link })
}

async fn first_link<S: BrowserSession>(
    session: &S,
    table: &TableLayout,
    cell: &S::Element,
) -> Option<String> {
    let anchors = session.find_elements_in(cell, &table.link).await.ok()?;
    let anchor = anchors.first()?;
    session.attribute(anchor, "href").await.ok().flatten()
}
