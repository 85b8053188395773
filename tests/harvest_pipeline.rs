//! Integration tests for the harvest pipeline.
//!
//! These tests drive the real form driver, table extraction, orchestration,
//! and export against an in-memory portal implementing `BrowserSession`, so
//! every keyword pass runs exactly as it would against a live page.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use disclosure_harvest::config::OutputConfig;
use disclosure_harvest::error::SessionInitError;
use disclosure_harvest::export::{export, ExportStatus, FileSink};
use disclosure_harvest::harvest::{run_keywords, run_with_provider, HarvestPlan, Stage};
use disclosure_harvest::models::SearchConfig;
use disclosure_harvest::progress::NoProgress;
use disclosure_harvest::session::{BrowserSession, Locator, SessionProvider};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ─── In-memory portal ───────────────────────────────────────────────

const TITLE: &str = "Title";
const BEGIN: &str = "BeginDate";
const END: &str = "EndDate";
const SUBMIT: &str = "btnSearch";

#[derive(Debug, Clone)]
struct FakeRow {
    cells: Vec<String>,
    link: Option<String>,
}

fn result_row(title: &str, date: &str, company: &str, file: &str) -> FakeRow {
    FakeRow {
        cells: vec![
            title.to_string(),
            date.to_string(),
            company.to_string(),
            "文件".to_string(),
        ],
        link: Some(format!("https://www1.hkexnews.hk/listedco/listconews/sehk/{}", file)),
    }
}

fn header_row() -> FakeRow {
    FakeRow {
        cells: vec![
            "標題".to_string(),
            "發放時間".to_string(),
            "股份名稱".to_string(),
            "文件".to_string(),
        ],
        link: Some("https://www1.hkexnews.hk/header.pdf".to_string()),
    }
}

/// Static behavior of the portal.
#[derive(Default, Clone)]
struct Site {
    /// Result rows per keyword, header excluded.
    results: HashMap<String, Vec<FakeRow>>,
    /// Form fields (by `name`) absent from the page.
    missing: HashSet<String>,
    /// Keywords whose search button never becomes clickable.
    unclickable_for: HashSet<String>,
    /// Keywords whose submission panics.
    panic_for: HashSet<String>,
    /// The title field disappears once this many searches were submitted.
    title_gone_after: Option<usize>,
    /// Keywords whose search renders no table rows at all.
    no_table_for: HashSet<String>,
    navigate_fails: bool,
}

impl Site {
    fn with_results(mut self, keyword: &str, rows: Vec<FakeRow>) -> Self {
        self.results.insert(keyword.to_string(), rows);
        self
    }
}

/// What happened during a run.
#[derive(Default, Debug)]
struct State {
    navigated: Vec<String>,
    fields: HashMap<String, String>,
    /// Rows currently rendered, header included.
    shown: Vec<FakeRow>,
    /// (title, begin, end) of every submission.
    submissions: Vec<(String, Option<String>, Option<String>)>,
    closed: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum El {
    Field(String),
    Submit,
    Row(usize),
    Cell(usize, usize),
    Anchor(usize),
}

struct FakeSession {
    site: Site,
    state: Arc<Mutex<State>>,
}

impl FakeSession {
    fn lookup(&self, locator: &Locator) -> Result<El> {
        match locator {
            Locator::Name(name) if self.site.missing.contains(name) => {
                bail!("no element {}", locator)
            }
            Locator::Name(name) if name == TITLE => {
                let submitted = self.state.lock().unwrap().submissions.len();
                match self.site.title_gone_after {
                    Some(limit) if submitted >= limit => bail!("no element {}", locator),
                    _ => Ok(El::Field(name.clone())),
                }
            }
            Locator::Name(name) if name == SUBMIT => Ok(El::Submit),
            Locator::Name(name) => Ok(El::Field(name.clone())),
            Locator::Tag(tag) if tag == "tr" => {
                if self.state.lock().unwrap().shown.is_empty() {
                    bail!("no element {}", locator)
                }
                Ok(El::Row(0))
            }
            other => bail!("unsupported locator {}", other),
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    type Element = El;

    async fn navigate(&self, url: &str) -> Result<()> {
        if self.site.navigate_fails {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        self.state.lock().unwrap().navigated.push(url.to_string());
        Ok(())
    }

    async fn wait_until_present(&self, locator: &Locator, _timeout: Duration) -> Result<El> {
        self.lookup(locator)
            .map_err(|e| anyhow!("timed out waiting: {}", e))
    }

    async fn wait_until_clickable(&self, locator: &Locator, timeout: Duration) -> Result<El> {
        let el = self.wait_until_present(locator, timeout).await?;
        let state = self.state.lock().unwrap();
        let title = state.fields.get(TITLE).cloned().unwrap_or_default();
        if el == El::Submit && self.site.unclickable_for.contains(&title) {
            bail!("timed out waiting for {} to be clickable", locator);
        }
        Ok(el)
    }

    async fn find_element(&self, locator: &Locator) -> Result<El> {
        self.lookup(locator)
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<El>> {
        match locator {
            Locator::Tag(tag) if tag == "tr" => {
                let n = self.state.lock().unwrap().shown.len();
                Ok((0..n).map(El::Row).collect())
            }
            other => Ok(self.lookup(other).into_iter().collect()),
        }
    }

    async fn find_elements_in(&self, scope: &El, locator: &Locator) -> Result<Vec<El>> {
        let state = self.state.lock().unwrap();
        match (scope, locator) {
            (El::Row(r), Locator::Tag(tag)) if tag == "td" => {
                let n = state.shown[*r].cells.len();
                Ok((0..n).map(|c| El::Cell(*r, c)).collect())
            }
            (El::Cell(r, c), Locator::Tag(tag)) if tag == "a" => {
                let row = &state.shown[*r];
                if *c + 1 == row.cells.len() && row.link.is_some() {
                    Ok(vec![El::Anchor(*r)])
                } else {
                    Ok(vec![])
                }
            }
            _ => Ok(vec![]),
        }
    }

    async fn text(&self, element: &El) -> Result<String> {
        let state = self.state.lock().unwrap();
        match element {
            El::Cell(r, c) => Ok(format!("  {}\n", state.shown[*r].cells[*c])),
            El::Field(name) => Ok(state.fields.get(name).cloned().unwrap_or_default()),
            other => bail!("no text for {:?}", other),
        }
    }

    async fn attribute(&self, element: &El, name: &str) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        match (element, name) {
            (El::Anchor(r), "href") => Ok(state.shown[*r].link.clone()),
            _ => Ok(None),
        }
    }

    async fn clear_and_type(&self, element: &El, value: &str) -> Result<()> {
        match element {
            El::Field(name) => {
                self.state
                    .lock()
                    .unwrap()
                    .fields
                    .insert(name.clone(), value.to_string());
                Ok(())
            }
            other => bail!("{:?} is not an input", other),
        }
    }

    async fn click(&self, element: &El) -> Result<()> {
        if *element != El::Submit {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        let title = state.fields.get(TITLE).cloned().unwrap_or_default();
        if self.site.panic_for.contains(&title) {
            drop(state);
            panic!("renderer crashed while searching {}", title);
        }
        let begin = state.fields.get(BEGIN).cloned();
        let end = state.fields.get(END).cloned();
        state.submissions.push((title.clone(), begin, end));

        state.shown = if self.site.no_table_for.contains(&title) {
            Vec::new()
        } else {
            let mut shown = vec![header_row()];
            shown.extend(self.site.results.get(&title).cloned().unwrap_or_default());
            shown
        };
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

struct FakeProvider {
    site: Site,
    state: Arc<Mutex<State>>,
    launch_fails: bool,
}

impl FakeProvider {
    fn new(site: Site) -> Self {
        Self {
            site,
            state: Arc::new(Mutex::new(State::default())),
            launch_fails: false,
        }
    }

    fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    type Session = FakeSession;

    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self) -> Result<FakeSession, SessionInitError> {
        if self.launch_fails {
            return Err(SessionInitError::Launch("no browser binary".to_string()));
        }
        Ok(FakeSession {
            site: self.site.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn plan(keywords: &[&str]) -> HarvestPlan {
    let search = SearchConfig::new(
        "2025/05/01",
        "2025/12/03",
        keywords.iter().map(|k| k.to_string()).collect(),
    )
    .unwrap();
    let mut plan = HarvestPlan::new(search, "https://www.hkexnews.hk/index_c.htm");
    plan.element_timeout = Duration::from_millis(50);
    plan.page_settle = Duration::ZERO;
    plan.search_settle = Duration::ZERO;
    plan
}

fn rights_issue_site() -> Site {
    Site::default()
        .with_results(
            "A",
            vec![
                result_row("供股章程", "12/06/2025", "甲控股", "2025/0612/2025061200456_c.pdf"),
                result_row("供股結果", "30/06/2025", "甲控股", "2025/0630/2025063000111_c.pdf"),
            ],
        )
        .with_results("B", vec![])
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn records_and_summary_for_two_keywords() {
    let provider = FakeProvider::new(rights_issue_site());
    let outcome = run_with_provider(&provider, &plan(&["A", "B"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 2);
    let first = &outcome.records[0];
    assert_eq!(first.keyword(), "A");
    assert_eq!(first.title(), "供股章程");
    assert_eq!(first.date(), "12/06/2025");
    assert_eq!(first.company(), "甲控股");
    assert_eq!(first.document_filename(), "2025061200456_c.pdf");
    assert_eq!(outcome.records[1].title(), "供股結果");

    let summary = &outcome.summary;
    assert_eq!(summary.total_results, 2);
    let counts: Vec<(&str, usize)> = summary
        .results_per_keyword
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    assert_eq!(counts, vec![("A", 2), ("B", 0)]);
    assert!(outcome.skipped.is_empty());

    let state = provider.state.lock().unwrap();
    assert_eq!(state.navigated, vec!["https://www.hkexnews.hk/index_c.htm"]);
    assert_eq!(state.submissions.len(), 2);
    assert_eq!(
        state.submissions[0],
        (
            "A".to_string(),
            Some("2025/05/01".to_string()),
            Some("2025/12/03".to_string())
        )
    );
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn keyword_whose_title_lookup_times_out_is_absent() {
    let mut site = Site::default().with_results(
        "A",
        vec![
            result_row("供股章程", "12/06/2025", "甲控股", "a1.pdf"),
            FakeRow {
                cells: vec!["通告".into(), "13/06/2025".into(), "甲控股".into(), "".into()],
                link: None,
            },
            result_row("供股結果", "30/06/2025", "甲控股", "a2.pdf"),
        ],
    );
    site.title_gone_after = Some(1);
    let provider = FakeProvider::new(site);

    let outcome = run_with_provider(&provider, &plan(&["A", "B"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.summary.results_per_keyword.len(), 1);
    assert_eq!(outcome.summary.results_per_keyword["A"], 2);
    assert_eq!(outcome.summary.total_results, 2);
    assert!(outcome.records.iter().all(|r| !r.document_link().is_empty()));
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].keyword, "B");
    assert_eq!(outcome.skipped[0].stage, Stage::LocateField);
}

#[tokio::test(start_paused = true)]
async fn settle_delays_are_waited_after_load_and_each_search() {
    let mut plan = plan(&["A", "B"]);
    plan.page_settle = Duration::from_secs(5);
    plan.search_settle = Duration::from_secs(3);
    let provider = FakeProvider::new(rights_issue_site());

    let started = tokio::time::Instant::now();
    let outcome = run_with_provider(&provider, &plan, &NoProgress)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5 + 2 * 3));
    assert_eq!(outcome.summary.total_results, 2);
}

#[tokio::test]
async fn search_without_result_table_counts_zero() {
    let mut site = rights_issue_site();
    site.no_table_for.insert("B".to_string());
    let provider = FakeProvider::new(site);

    let outcome = run_with_provider(&provider, &plan(&["B", "A"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.summary.results_per_keyword.get("B"), Some(&0));
    assert!(outcome.skipped.iter().all(|s| s.keyword != "B"));
    assert_eq!(outcome.summary.results_per_keyword.get("A"), Some(&2));
    assert_eq!(provider.state.lock().unwrap().submissions.len(), 2);
}

#[tokio::test]
async fn header_row_is_never_a_record() {
    let provider = FakeProvider::new(rights_issue_site());
    let outcome = run_with_provider(&provider, &plan(&["A"]), &NoProgress)
        .await
        .unwrap();
    assert!(outcome
        .records
        .iter()
        .all(|r| r.document_filename() != "header.pdf"));
}

#[tokio::test]
async fn no_matches_anywhere() {
    let provider = FakeProvider::new(Site::default());
    let outcome = run_with_provider(&provider, &plan(&["供股", "配股", "易手"]), &NoProgress)
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.summary.total_results, 0);
    assert_eq!(outcome.summary.results_per_keyword.len(), 3);
    assert!(outcome.summary.results_per_keyword.values().all(|&n| n == 0));
}

#[tokio::test]
async fn short_rows_and_rows_without_links_are_dropped() {
    let site = Site::default().with_results(
        "A",
        vec![
            FakeRow {
                cells: vec!["a".into(), "b".into(), "c".into()],
                link: Some("https://example.com/three-cells.pdf".into()),
            },
            FakeRow {
                cells: vec!["通告".into(), "01/06/2025".into(), "乙".into(), "".into()],
                link: None,
            },
            FakeRow {
                cells: vec!["通告".into(), "01/06/2025".into(), "乙".into(), "".into()],
                link: Some("   ".into()),
            },
            result_row("配股", "02/06/2025", "丙", "kept.pdf"),
        ],
    );
    let provider = FakeProvider::new(site);
    let outcome = run_with_provider(&provider, &plan(&["A"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].document_filename(), "kept.pdf");
    assert_eq!(outcome.summary.results_per_keyword["A"], 1);
}

#[tokio::test]
async fn extraction_is_repeatable_on_an_unchanged_page() {
    let provider = FakeProvider::new(rights_issue_site());
    let session = provider.open().await.unwrap();
    let plan = plan(&["A"]);

    let first = run_keywords(&session, &plan, &NoProgress).await;
    let second = run_keywords(&session, &plan, &NoProgress).await;

    let fields = |o: &disclosure_harvest::harvest::HarvestOutcome| -> Vec<(String, String, String, String, String)> {
        o.records
            .iter()
            .map(|r| {
                (
                    r.keyword().to_string(),
                    r.title().to_string(),
                    r.date().to_string(),
                    r.company().to_string(),
                    r.document_link().to_string(),
                )
            })
            .collect()
    };
    assert_eq!(fields(&first), fields(&second));
}

#[tokio::test]
async fn missing_date_fields_do_not_stop_the_search() {
    let mut site = rights_issue_site();
    site.missing.insert(BEGIN.to_string());
    site.missing.insert(END.to_string());
    let provider = FakeProvider::new(site);

    let outcome = run_with_provider(&provider, &plan(&["A"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 2);
    let state = provider.state.lock().unwrap();
    assert_eq!(state.submissions, vec![("A".to_string(), None, None)]);
}

#[tokio::test]
async fn missing_title_field_skips_every_keyword() {
    let mut site = rights_issue_site();
    site.missing.insert(TITLE.to_string());
    let provider = FakeProvider::new(site);

    let outcome = run_with_provider(&provider, &plan(&["A", "B"]), &NoProgress)
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert!(outcome.summary.results_per_keyword.is_empty());
    assert_eq!(outcome.skipped.len(), 2);
    assert!(outcome.skipped.iter().all(|s| s.stage == Stage::LocateField));
    assert_eq!(provider.closed(), 1);
}

#[tokio::test]
async fn unclickable_submit_skips_only_that_keyword() {
    let mut site = rights_issue_site().with_results("C", vec![result_row("易手", "03/07/2025", "丁", "c.pdf")]);
    site.unclickable_for.insert("A".to_string());
    let provider = FakeProvider::new(site);

    let outcome = run_with_provider(&provider, &plan(&["A", "C"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].keyword, "A");
    assert_eq!(outcome.skipped[0].stage, Stage::Submit);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].keyword(), "C");
    assert!(!outcome.summary.results_per_keyword.contains_key("A"));
    assert!(outcome.summary.results_per_keyword.len() <= 2);
    let sum: usize = outcome.summary.results_per_keyword.values().sum();
    assert_eq!(sum, outcome.summary.total_results);
}

#[tokio::test]
async fn panicking_pass_is_contained() {
    let mut site = rights_issue_site().with_results("C", vec![result_row("全購", "04/07/2025", "戊", "d.pdf")]);
    site.panic_for.insert("A".to_string());
    let provider = FakeProvider::new(site);

    let outcome = run_with_provider(&provider, &plan(&["A", "C"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(outcome.summary.results_per_keyword.get("A"), Some(&0));
    assert_eq!(outcome.summary.results_per_keyword.get("C"), Some(&1));
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(provider.closed(), 1);
}

#[tokio::test]
async fn repeated_keyword_is_searched_twice_and_counted_once() {
    let provider = FakeProvider::new(rights_issue_site());
    let outcome = run_with_provider(&provider, &plan(&["A", "B", "A"]), &NoProgress)
        .await
        .unwrap();

    assert_eq!(provider.state.lock().unwrap().submissions.len(), 3);
    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.summary.results_per_keyword.len(), 2);
    assert_eq!(outcome.summary.results_per_keyword["A"], 4);
    assert_eq!(outcome.summary.total_results, 4);
}

#[tokio::test]
async fn unreachable_portal_is_a_session_error_and_closes() {
    let mut site = rights_issue_site();
    site.navigate_fails = true;
    let provider = FakeProvider::new(site);

    let err = run_with_provider(&provider, &plan(&["A"]), &NoProgress)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionInitError::Navigate { .. }));
    assert_eq!(provider.closed(), 1);
    assert!(provider.state.lock().unwrap().submissions.is_empty());
}

#[tokio::test]
async fn failed_launch_is_a_session_error() {
    let mut provider = FakeProvider::new(rights_issue_site());
    provider.launch_fails = true;

    let err = run_with_provider(&provider, &plan(&["A"]), &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionInitError::Launch(_)));
    assert_eq!(provider.closed(), 0);
}

#[tokio::test]
async fn harvest_then_export_writes_both_files() {
    let tmp = TempDir::new().unwrap();
    let output = OutputConfig {
        dir: tmp.path().join("hkex_search_results"),
        ..OutputConfig::default()
    };

    let provider = FakeProvider::new(rights_issue_site());
    let outcome = run_with_provider(&provider, &plan(&["A", "B"]), &NoProgress)
        .await
        .unwrap();
    let report = export(&outcome.records, &outcome.summary, &FileSink::new(&output));
    assert_eq!(report.status(), ExportStatus::Complete);

    let csv = std::fs::read_to_string(output.records_path()).unwrap();
    // header + two records
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains("2025061200456_c.pdf"));

    let log: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.log_path()).unwrap()).unwrap();
    assert_eq!(log["total_results"], 2);
    assert_eq!(log["keywords_results"]["A"], 2);
    assert_eq!(log["keywords_results"]["B"], 0);
    assert_eq!(log["keywords"], serde_json::json!(["A", "B"]));
}
