//! # Disclosure Harvest CLI (`dharvest`)
//!
//! ## Usage
//!
//! ```bash
//! dharvest --config ./config/dharvest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dharvest init` | Write an example configuration file |
//! | `dharvest check` | Validate the configuration and print the search plan |
//! | `dharvest run` | Search every keyword, extract document links, export |
//!
//! ## Examples
//!
//! ```bash
//! # Scaffold and edit a configuration
//! dharvest init
//!
//! # Run without a window, overriding the keywords
//! dharvest run --headless --keyword 供股 --keyword 配股
//!
//! # One-off run without a config file
//! dharvest run --defaults --start 2025/06/01 --end 2025/06/30
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use disclosure_harvest::chrome::ChromeProvider;
use disclosure_harvest::config::{self, Config};
use disclosure_harvest::export::{self, ExportStatus, FileSink};
use disclosure_harvest::harvest::{self, HarvestPlan};
use disclosure_harvest::progress::ProgressMode;
use disclosure_harvest::report;

/// Disclosure Harvest: keyword search and PDF link extraction for
/// disclosure portals.
#[derive(Parser)]
#[command(
    name = "dharvest",
    about = "Search a disclosure portal by keyword and export links to the matching documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dharvest.toml")]
    config: PathBuf,

    /// Debug logging for this crate (RUST_LOG takes precedence).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example configuration to the config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and print the search plan.
    Check {
        /// Use built-in defaults instead of reading the config file.
        #[arg(long)]
        defaults: bool,
    },

    /// Run every keyword search and export the results.
    ///
    /// Launches a browser, loads the portal, fills and submits the search
    /// form once per keyword, collects every result row that links to a
    /// document, then writes the CSV table and the JSON run log.
    Run {
        /// Use built-in defaults instead of reading the config file.
        #[arg(long)]
        defaults: bool,

        /// Start date (YYYY/MM/DD), overrides `search.start_date`.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY/MM/DD), overrides `search.end_date`.
        #[arg(long)]
        end: Option<String>,

        /// Keyword to search; repeat for several. Replaces `search.keywords`.
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        /// Run the browser without a window.
        #[arg(long)]
        headless: bool,

        /// Output directory, overrides `output.dir`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress on stderr: off, human, or json. Defaults to human on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,disclosure_harvest=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path, defaults: bool) -> Result<Config> {
    if defaults {
        Ok(Config::default())
    } else {
        config::load_config(path)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { force } => {
            config::write_example(&cli.config, force)?;
            println!("Wrote {}", cli.config.display());
        }
        Commands::Check { defaults } => {
            let cfg = load(&cli.config, defaults)?;
            report::print_plan(&cfg)?;
        }
        Commands::Run {
            defaults,
            start,
            end,
            keywords,
            headless,
            output,
            progress,
        } => {
            let mut cfg = load(&cli.config, defaults)?;
            if let Some(start) = start {
                cfg.search.start_date = start;
            }
            if let Some(end) = end {
                cfg.search.end_date = end;
            }
            if !keywords.is_empty() {
                cfg.search.keywords = keywords;
            }
            if headless {
                cfg.browser.headless = true;
            }
            if let Some(dir) = output {
                cfg.output.dir = dir;
            }
            cfg.validate()?;

            let plan = HarvestPlan::from_config(&cfg)?;
            let provider = ChromeProvider::new(cfg.browser.clone());
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();

            let outcome = harvest::run_with_provider(&provider, &plan, reporter.as_ref()).await?;

            let sink = FileSink::new(&cfg.output);
            let exported = export::export(&outcome.records, &outcome.summary, &sink);
            report::print_report(&outcome, &exported);

            if exported.status() == ExportStatus::Failed {
                bail!("export failed: no output file could be written");
            }
        }
    }

    Ok(())
}
