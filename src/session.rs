//! Browser session abstraction.
//!
//! The harvest pipeline never talks to a browser engine directly. Everything
//! it needs from a live page goes through [`BrowserSession`], and sessions
//! are created through a [`SessionProvider`]. The production backend lives in
//! [`crate::chrome`]; tests plug in an in-memory DOM.
//!
//! # Lifecycle
//!
//! 1. [`SessionProvider::open`] yields a fresh session.
//! 2. The orchestrator navigates to the portal and runs every keyword pass
//!    against that one session.
//! 3. [`BrowserSession::close`] is called exactly once at the end.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::SessionInitError;

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Element whose `name` attribute equals the value.
    Name(String),
    /// Elements with the given tag name (`tr`, `td`, `a`).
    Tag(String),
    /// Raw CSS selector.
    Css(String),
}

impl Locator {
    pub fn name(value: impl Into<String>) -> Self {
        Locator::Name(value.into())
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Locator::Tag(value.into())
    }

    /// A bare tag name becomes [`Locator::Tag`], anything else [`Locator::Css`].
    pub fn selector(value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()) {
            Locator::Tag(value.to_ascii_lowercase())
        } else {
            Locator::Css(value.to_string())
        }
    }

    /// CSS selector equivalent of this locator.
    pub fn to_css(&self) -> String {
        match self {
            Locator::Name(name) => format!("[name=\"{}\"]", name.replace('"', "\\\"")),
            Locator::Tag(tag) => tag.clone(),
            Locator::Css(css) => css.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(name) => write!(f, "name={}", name),
            Locator::Tag(tag) => write!(f, "tag={}", tag),
            Locator::Css(css) => write!(f, "css={}", css),
        }
    }
}

/// A live, navigable page session.
///
/// All calls are sequential; implementations may assume no two calls run
/// concurrently. Waits are bounded by the timeout passed in; every other call
/// acts on the DOM as it is right now.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Handle to an element of the current DOM.
    type Element: Send + Sync;

    /// Load `url` in the session's page.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until an element matching `locator` is present.
    async fn wait_until_present(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element>;

    /// Wait until an element matching `locator` is present and clickable.
    async fn wait_until_clickable(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Self::Element>;

    /// First element matching `locator`, without waiting.
    async fn find_element(&self, locator: &Locator) -> Result<Self::Element>;

    /// All elements matching `locator` in document order, without waiting.
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<Self::Element>>;

    /// All descendants of `scope` matching `locator` in document order.
    async fn find_elements_in(
        &self,
        scope: &Self::Element,
        locator: &Locator,
    ) -> Result<Vec<Self::Element>>;

    /// Rendered text of the element.
    async fn text(&self, element: &Self::Element) -> Result<String>;

    /// Attribute (or resolved property, e.g. absolute `href`) of the element.
    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Clear the input's value, then type `value`.
    async fn clear_and_type(&self, element: &Self::Element, value: &str) -> Result<()>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    /// Release the session. Called once per session.
    async fn close(&self) -> Result<()>;
}

/// Factory for browser sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: BrowserSession;

    /// Short label for logs (e.g. `"chrome"`).
    fn name(&self) -> &str;

    /// Start a new session.
    async fn open(&self) -> Result<Self::Session, SessionInitError>;
}
