//! Keyword orchestration.
//!
//! Coordinates the full run: open session → load portal → for each keyword
//! (fill form → settle → extract) → close session. Each keyword pass is
//! isolated: a fatal form failure skips that keyword only, and a panic inside
//! a pass is contained and counted as a pass that found nothing.
//!
//! Results are accumulated in a [`Harvest`] value threaded through the loop
//! and returned once as a [`HarvestOutcome`].

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use futures::FutureExt;
use indexmap::IndexMap;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{FormError, SessionInitError};
use crate::extract::{extract_records, TableLayout};
use crate::form::{submit_search, FormLayout};
use crate::models::{DisclosureRecord, RunSummary, SearchConfig};
use crate::progress::{HarvestEvent, HarvestProgressReporter};
use crate::session::{BrowserSession, SessionProvider};

/// Everything a run needs besides the session itself.
#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub search: SearchConfig,
    pub url: String,
    pub form: FormLayout,
    pub table: TableLayout,
    /// Bound on every element wait.
    pub element_timeout: Duration,
    /// Fixed wait after loading the portal.
    pub page_settle: Duration,
    /// Fixed wait between submitting a search and reading its results.
    pub search_settle: Duration,
}

impl HarvestPlan {
    /// Plan with the default page layout and timings.
    pub fn new(search: SearchConfig, url: impl Into<String>) -> Self {
        let timing = crate::config::TimingConfig::default();
        Self {
            search,
            url: url.into(),
            form: FormLayout::default(),
            table: TableLayout::default(),
            element_timeout: timing.element_timeout(),
            page_settle: timing.page_settle(),
            search_settle: timing.search_settle(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            search: config.search_config()?,
            url: config.site.url.clone(),
            form: FormLayout::from_selectors(&config.site.selectors),
            table: TableLayout::from_selectors(&config.site.selectors),
            element_timeout: config.timing.element_timeout(),
            page_settle: config.timing.page_settle(),
            search_settle: config.timing.search_settle(),
        })
    }
}

/// Stage of a keyword pass that can abandon it, in execution order.
///
/// Extraction has no stage here: it never fails, an unreadable table yields
/// no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LocateField,
    SetDates,
    Submit,
}

impl Stage {
    /// Stage a form failure belongs to.
    pub fn of(err: &FormError) -> Self {
        match err {
            FormError::FieldNotFound { .. } | FormError::FieldInput { .. } => Stage::LocateField,
            FormError::DateField { .. } => Stage::SetDates,
            FormError::SubmitControlUnavailable { .. } => Stage::Submit,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LocateField => "locate-field",
            Stage::SetDates => "set-dates",
            Stage::Submit => "submit",
        };
        f.write_str(name)
    }
}

/// Result of one keyword pass.
#[derive(Debug)]
pub enum KeywordOutcome {
    /// The search ran; these are its records (possibly none).
    Completed(Vec<DisclosureRecord>),
    /// A fatal form failure abandoned the keyword.
    Skipped { stage: Stage, reason: String },
    /// The pass panicked; counted as a completed pass with no records.
    Crashed { reason: String },
}

/// A keyword abandoned by a fatal failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedKeyword {
    pub keyword: String,
    pub stage: Stage,
    pub reason: String,
}

/// Accumulator folded over keyword passes.
#[derive(Debug, Default)]
pub struct Harvest {
    records: Vec<DisclosureRecord>,
    per_keyword: IndexMap<String, usize>,
    skipped: Vec<SkippedKeyword>,
}

impl Harvest {
    /// Fold one keyword's outcome in. Repeated keywords add to their
    /// existing entry.
    pub fn fold(mut self, keyword: &str, outcome: KeywordOutcome) -> Self {
        match outcome {
            KeywordOutcome::Completed(records) => {
                *self.per_keyword.entry(keyword.to_string()).or_insert(0) += records.len();
                self.records.extend(records);
            }
            KeywordOutcome::Crashed { .. } => {
                self.per_keyword.entry(keyword.to_string()).or_insert(0);
            }
            KeywordOutcome::Skipped { stage, reason } => {
                self.skipped.push(SkippedKeyword {
                    keyword: keyword.to_string(),
                    stage,
                    reason,
                });
            }
        }
        self
    }

    pub fn finish(self, mut summary: RunSummary) -> HarvestOutcome {
        summary.total_results = self.records.len();
        summary.results_per_keyword = self.per_keyword;
        HarvestOutcome {
            records: self.records,
            summary,
            skipped: self.skipped,
        }
    }
}

/// Everything a run produced.
#[derive(Debug)]
pub struct HarvestOutcome {
    /// Keyword-major, then row order within each keyword.
    pub records: Vec<DisclosureRecord>,
    pub summary: RunSummary,
    pub skipped: Vec<SkippedKeyword>,
}

impl HarvestOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Open a session through `provider`, load the portal, run every keyword,
/// and close the session.
///
/// Only session setup can fail the run. The session is closed once whether
/// or not setup succeeded; a close failure is logged.
pub async fn run_with_provider<P: SessionProvider>(
    provider: &P,
    plan: &HarvestPlan,
    reporter: &dyn HarvestProgressReporter,
) -> Result<HarvestOutcome, SessionInitError> {
    info!(provider = provider.name(), "opening browser session");
    let session = provider.open().await?;

    if let Err(e) = open_portal(&session, plan).await {
        close_session(&session).await;
        return Err(e);
    }
    reporter.report(HarvestEvent::Started {
        url: plan.url.clone(),
        keywords: plan.search.keywords().len(),
    });

    let outcome = run_keywords(&session, plan, reporter).await;

    close_session(&session).await;
    Ok(outcome)
}

async fn open_portal<S: BrowserSession>(
    session: &S,
    plan: &HarvestPlan,
) -> Result<(), SessionInitError> {
    info!(url = %plan.url, "loading portal");
    session
        .navigate(&plan.url)
        .await
        .map_err(|e| SessionInitError::Navigate {
            url: plan.url.clone(),
            reason: e.to_string(),
        })?;
    tokio::time::sleep(plan.page_settle).await;
    Ok(())
}

async fn close_session<S: BrowserSession>(session: &S) {
    match session.close().await {
        Ok(()) => info!("browser session closed"),
        Err(e) => warn!("failed to close browser session: {}", e),
    }
}

/// Run every keyword of the plan against an already loaded session.
pub async fn run_keywords<S: BrowserSession>(
    session: &S,
    plan: &HarvestPlan,
    reporter: &dyn HarvestProgressReporter,
) -> HarvestOutcome {
    let summary = RunSummary::started(&plan.search, Local::now());
    let keywords = plan.search.keywords();
    let total = keywords.len();

    let mut harvest = Harvest::default();
    for (idx, keyword) in keywords.iter().enumerate() {
        reporter.report(HarvestEvent::KeywordStarted {
            index: idx + 1,
            total,
            keyword: keyword.clone(),
        });

        let pass = keyword_pass(session, plan, keyword, reporter);
        let outcome = match AssertUnwindSafe(pass).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => KeywordOutcome::Crashed {
                reason: panic_message(panic.as_ref()),
            },
        };

        match &outcome {
            KeywordOutcome::Completed(records) => {
                info!(keyword = %keyword, count = records.len(), "keyword finished");
                reporter.report(HarvestEvent::KeywordFinished {
                    keyword: keyword.clone(),
                    count: records.len(),
                });
            }
            KeywordOutcome::Skipped { stage, reason } => {
                warn!(keyword = %keyword, %stage, "keyword skipped: {}", reason);
                reporter.report(HarvestEvent::KeywordSkipped {
                    keyword: keyword.clone(),
                    stage: stage.to_string(),
                    reason: reason.clone(),
                });
            }
            KeywordOutcome::Crashed { reason } => {
                error!(keyword = %keyword, "keyword pass failed unexpectedly: {}", reason);
                reporter.report(HarvestEvent::KeywordFinished {
                    keyword: keyword.clone(),
                    count: 0,
                });
            }
        }

        harvest = harvest.fold(keyword, outcome);
    }

    harvest.finish(summary)
}

async fn keyword_pass<S: BrowserSession>(
    session: &S,
    plan: &HarvestPlan,
    keyword: &str,
    reporter: &dyn HarvestProgressReporter,
) -> KeywordOutcome {
    let submitted = match submit_search(
        session,
        &plan.form,
        keyword,
        plan.search.start_date(),
        plan.search.end_date(),
        plan.element_timeout,
    )
    .await
    {
        Ok(submitted) => submitted,
        Err(e) => {
            return KeywordOutcome::Skipped {
                stage: Stage::of(&e),
                reason: e.to_string(),
            }
        }
    };

    if let Some(warning) = submitted.date_warning {
        warn!(keyword, "{}", warning);
        reporter.report(HarvestEvent::DateWarning {
            keyword: keyword.to_string(),
            reason: warning.to_string(),
        });
    }
    reporter.report(HarvestEvent::Submitted {
        keyword: keyword.to_string(),
    });

    tokio::time::sleep(plan.search_settle).await;

    let records = extract_records(session, &plan.table, keyword, plan.element_timeout).await;
    for (idx, record) in records.iter().enumerate() {
        reporter.report(HarvestEvent::RecordCaptured {
            keyword: keyword.to_string(),
            n: idx + 1,
            title: record.title().to_string(),
        });
    }

    KeywordOutcome::Completed(records)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
