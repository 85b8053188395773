//! TOML configuration parsing.
//!
//! Every section has defaults reproducing the portal's current layout, so an
//! empty file is a valid configuration. See [`EXAMPLE_CONFIG`] for the full
//! set of keys.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::SearchConfig;

/// Written by `dharvest init`.
pub const EXAMPLE_CONFIG: &str = r#"# dharvest configuration

[search]
start_date = "2025/05/01"
end_date = "2025/12/03"
keywords = ["供股", "配股", "股權集中", "易手", "全購"]

[site]
url = "https://www.hkexnews.hk/index_c.htm"

[site.selectors]
title_field = "Title"
begin_date_field = "BeginDate"
end_date_field = "EndDate"
submit_control = "btnSearch"
row = "tr"
cell = "td"
link = "a"

[timing]
element_timeout_secs = 10
page_settle_secs = 5
search_settle_secs = 5

[browser]
headless = false
# executable = "/usr/bin/chromium"
args = [
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
]

[output]
dir = "hkex_search_results"
records_file = "pdf_links.csv"
log_file = "search_log.json"
"#;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchSection {
    #[serde(default = "default_start_date")]
    pub start_date: String,
    #[serde(default = "default_end_date")]
    pub end_date: String,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: default_end_date(),
            keywords: default_keywords(),
        }
    }
}

fn default_start_date() -> String {
    "2025/05/01".to_string()
}
fn default_end_date() -> String {
    "2025/12/03".to_string()
}
fn default_keywords() -> Vec<String> {
    ["供股", "配股", "股權集中", "易手", "全購"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SiteConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub selectors: SelectorsConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            selectors: SelectorsConfig::default(),
        }
    }
}

fn default_url() -> String {
    "https://www.hkexnews.hk/index_c.htm".to_string()
}

/// DOM contract of the search page. Field entries are `name` attributes;
/// table entries are tag names or CSS selectors.
#[derive(Debug, Deserialize, Clone)]
pub struct SelectorsConfig {
    #[serde(default = "default_title_field")]
    pub title_field: String,
    #[serde(default = "default_begin_date_field")]
    pub begin_date_field: String,
    #[serde(default = "default_end_date_field")]
    pub end_date_field: String,
    #[serde(default = "default_submit_control")]
    pub submit_control: String,
    #[serde(default = "default_row")]
    pub row: String,
    #[serde(default = "default_cell")]
    pub cell: String,
    #[serde(default = "default_link")]
    pub link: String,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            title_field: default_title_field(),
            begin_date_field: default_begin_date_field(),
            end_date_field: default_end_date_field(),
            submit_control: default_submit_control(),
            row: default_row(),
            cell: default_cell(),
            link: default_link(),
        }
    }
}

fn default_title_field() -> String {
    "Title".to_string()
}
fn default_begin_date_field() -> String {
    "BeginDate".to_string()
}
fn default_end_date_field() -> String {
    "EndDate".to_string()
}
fn default_submit_control() -> String {
    "btnSearch".to_string()
}
fn default_row() -> String {
    "tr".to_string()
}
fn default_cell() -> String {
    "td".to_string()
}
fn default_link() -> String {
    "a".to_string()
}

impl SelectorsConfig {
    fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("title_field", &self.title_field),
            ("begin_date_field", &self.begin_date_field),
            ("end_date_field", &self.end_date_field),
            ("submit_control", &self.submit_control),
            ("row", &self.row),
            ("cell", &self.cell),
            ("link", &self.link),
        ]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_element_timeout_secs")]
    pub element_timeout_secs: u64,
    /// Fixed wait after loading the portal.
    #[serde(default = "default_settle_secs")]
    pub page_settle_secs: u64,
    /// Fixed wait after submitting a search, before reading the results.
    #[serde(default = "default_settle_secs")]
    pub search_settle_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            element_timeout_secs: default_element_timeout_secs(),
            page_settle_secs: default_settle_secs(),
            search_settle_secs: default_settle_secs(),
        }
    }
}

fn default_element_timeout_secs() -> u64 {
    10
}
fn default_settle_secs() -> u64 {
    5
}

impl TimingConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_secs(self.page_settle_secs)
    }

    pub fn search_settle(&self) -> Duration {
        Duration::from_secs(self.search_settle_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    /// Browser binary; auto-detected when unset.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            args: default_browser_args(),
        }
    }
}

fn default_browser_args() -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_records_file")]
    pub records_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            records_file: default_records_file(),
            log_file: default_log_file(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("hkex_search_results")
}
fn default_records_file() -> String {
    "pdf_links.csv".to_string()
}
fn default_log_file() -> String {
    "search_log.json".to_string()
}

impl OutputConfig {
    pub fn records_path(&self) -> PathBuf {
        self.dir.join(&self.records_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(&self.log_file)
    }
}

impl Config {
    /// Validated search parameters of this configuration.
    pub fn search_config(&self) -> Result<SearchConfig> {
        SearchConfig::new(
            self.search.start_date.clone(),
            self.search.end_date.clone(),
            self.search.keywords.clone(),
        )
        .context("invalid [search] section")
    }

    pub fn validate(&self) -> Result<()> {
        self.search_config()?;

        if self.site.url.trim().is_empty() {
            bail!("site.url must not be empty");
        }

        for (key, value) in self.site.selectors.entries() {
            if value.trim().is_empty() {
                bail!("site.selectors.{} must not be empty", key);
            }
        }

        if self.timing.element_timeout_secs == 0 {
            bail!("timing.element_timeout_secs must be > 0");
        }

        if self.output.records_file.trim().is_empty() {
            bail!("output.records_file must not be empty");
        }
        if self.output.log_file.trim().is_empty() {
            bail!("output.log_file must not be empty");
        }
        if self.output.records_file == self.output.log_file {
            bail!("output.records_file and output.log_file must differ");
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Write [`EXAMPLE_CONFIG`] to `path`, refusing to overwrite unless `force`.
pub fn write_example(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
