//! # Disclosure Harvest
//!
//! Keyword search automation for public disclosure portals.
//!
//! Drives the portal's search form once per keyword over a date range,
//! reads the rendered results table, keeps every row that links to a
//! document, and exports the collected records as CSV together with a JSON
//! run log.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │   Session    │──▶│  Harvest (per keyword)        │──▶│  Export  │
//! │ Chrome / fake│   │  Form → settle → Extract     │   │ CSV+JSON │
//! └──────────────┘   └──────────────────────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dharvest init                      # write config/dharvest.toml
//! dharvest check                     # validate and show the search plan
//! dharvest run --headless            # search, extract, export
//! dharvest run --keyword 供股 --start 2025/06/01 --end 2025/06/30
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Search config, records, run summary |
//! | [`session`] | Browser session traits and locators |
//! | [`chrome`] | Chrome DevTools session backend |
//! | [`form`] | Search form driver |
//! | [`extract`] | Results table extraction |
//! | [`harvest`] | Keyword orchestration |
//! | [`export`] | CSV and run log output |
//! | [`report`] | End-of-run console report |
//! | [`progress`] | Progress reporting |
//! | [`error`] | Error types |

pub mod chrome;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod form;
pub mod harvest;
pub mod models;
pub mod progress;
pub mod report;
pub mod session;
