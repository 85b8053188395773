//! Search form driver.
//!
//! Fills the portal's search form for one keyword and date range, then
//! activates the submit control. Only the title field and the submit control
//! are required; the date fields are best-effort because the search endpoint
//! falls back to its own default range.
//!
//! The driver returns as soon as the submit control is clicked. The caller is
//! responsible for waiting the search settle delay before reading results.

use std::time::Duration;

use tracing::debug;

use crate::config::SelectorsConfig;
use crate::error::FormError;
use crate::session::{BrowserSession, Locator};

/// Locators of the search form's controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLayout {
    pub title: Locator,
    pub begin_date: Locator,
    pub end_date: Locator,
    pub submit: Locator,
}

impl FormLayout {
    pub fn from_selectors(selectors: &SelectorsConfig) -> Self {
        Self {
            title: Locator::name(&selectors.title_field),
            begin_date: Locator::name(&selectors.begin_date_field),
            end_date: Locator::name(&selectors.end_date_field),
            submit: Locator::name(&selectors.submit_control),
        }
    }
}

impl Default for FormLayout {
    fn default() -> Self {
        Self::from_selectors(&SelectorsConfig::default())
    }
}

/// A search was submitted.
#[derive(Debug)]
pub struct Submitted {
    /// Set when the date range could not be applied. The search still ran,
    /// with whatever dates the form held.
    pub date_warning: Option<FormError>,
}

/// Fill and submit the search form for `keyword`.
///
/// Fails only with a fatal [`FormError`]; a [`FormError::DateField`] failure
/// is reported through [`Submitted::date_warning`] instead.
pub async fn submit_search<S: BrowserSession>(
    session: &S,
    form: &FormLayout,
    keyword: &str,
    start_date: &str,
    end_date: &str,
    timeout: Duration,
) -> Result<Submitted, FormError> {
    let title = session
        .wait_until_present(&form.title, timeout)
        .await
        .map_err(|e| FormError::FieldNotFound {
            field: "title",
            reason: format!("{} ({})", e, form.title),
        })?;

    session
        .clear_and_type(&title, keyword)
        .await
        .map_err(|e| FormError::FieldInput {
            field: "title",
            reason: e.to_string(),
        })?;
    debug!(keyword, "title field filled");

    let date_warning = match set_dates(session, form, start_date, end_date, timeout).await {
        Ok(()) => None,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => Some(e),
    };

    let submit = session
        .wait_until_clickable(&form.submit, timeout)
        .await
        .map_err(|e| FormError::SubmitControlUnavailable {
            reason: format!("{} ({})", e, form.submit),
        })?;

    session
        .click(&submit)
        .await
        .map_err(|e| FormError::SubmitControlUnavailable {
            reason: format!("click failed: {}", e),
        })?;
    debug!(keyword, "search submitted");

    Ok(Submitted { date_warning })
}

/// Begin date waits like the title field; the end date sits in the same
/// form, so it is looked up directly. The first failure ends the stage.
async fn set_dates<S: BrowserSession>(
    session: &S,
    form: &FormLayout,
    start_date: &str,
    end_date: &str,
    timeout: Duration,
) -> Result<(), FormError> {
    let begin = session
        .wait_until_present(&form.begin_date, timeout)
        .await
        .map_err(|e| FormError::DateField {
            field: "begin_date",
            reason: e.to_string(),
        })?;
    session
        .clear_and_type(&begin, start_date)
        .await
        .map_err(|e| FormError::DateField {
            field: "begin_date",
            reason: e.to_string(),
        })?;

    let end = session
        .find_element(&form.end_date)
        .await
        .map_err(|e| FormError::DateField {
            field: "end_date",
            reason: e.to_string(),
        })?;
    session
        .clear_and_type(&end, end_date)
        .await
        .map_err(|e| FormError::DateField {
            field: "end_date",
            reason: e.to_string(),
        })?;

    Ok(())
}
