//! Typed errors for the harvest pipeline.
//!
//! Each enum matches one containment level: [`SessionInitError`] aborts the
//! whole run, [`FormError`] is scoped to a single keyword pass, and
//! [`ExportError`] is scoped to a single output file. Row-level parse
//! failures never surface as errors (see [`crate::extract::parse_row`]).

use std::path::PathBuf;

use thiserror::Error;

/// The browser session could not be created or the portal failed to load.
#[derive(Debug, Error)]
pub enum SessionInitError {
    /// The browser process or driver connection could not be started.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// The initial navigation to the portal failed.
    #[error("failed to load {url}: {reason}")]
    Navigate { url: String, reason: String },
}

/// Failure while filling or submitting the search form for one keyword.
#[derive(Debug, Error)]
pub enum FormError {
    /// A required form field did not appear within the wait window.
    #[error("field '{field}' not found: {reason}")]
    FieldNotFound { field: &'static str, reason: String },

    /// A required form field was found but could not be cleared or typed into.
    #[error("field '{field}' could not be filled: {reason}")]
    FieldInput { field: &'static str, reason: String },

    /// A date field was missing or rejected input. Never fatal.
    #[error("date field '{field}' could not be set: {reason}")]
    DateField { field: &'static str, reason: String },

    /// The submit control was absent or not clickable within the wait window.
    #[error("submit control unavailable: {reason}")]
    SubmitControlUnavailable { reason: String },
}

impl FormError {
    /// Whether this failure abandons the current keyword.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FormError::DateField { .. })
    }
}

/// Failure writing one of the export files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_date_errors_are_non_fatal() {
        let date = FormError::DateField {
            field: "begin_date",
            reason: "timeout".into(),
        };
        let title = FormError::FieldNotFound {
            field: "title",
            reason: "timeout".into(),
        };
        let input = FormError::FieldInput {
            field: "title",
            reason: "detached".into(),
        };
        let submit = FormError::SubmitControlUnavailable {
            reason: "timeout".into(),
        };
        assert!(!date.is_fatal());
        assert!(title.is_fatal());
        assert!(input.is_fatal());
        assert!(submit.is_fatal());
    }
}
