//! Browser collaborator seam.
//!
//! A [`Browser`] hands out one [`BrowserSession`] per pass. The session navigates to a search
//! results page and returns the candidate anchors on it as opaque [`CandidateHandle`]s, whose
//! fields are read lazily so a single broken element only costs that element.

pub mod error;
pub mod http;
pub mod webdriver;

pub use error::{BrowserError, Result};
pub use http::{HttpBrowser, HttpCandidate, HttpSession};
pub use webdriver::{WebDriverBrowser, WebDriverCandidate, WebDriverSession};

use async_trait::async_trait;

/// CSS selector for result anchors on the marketplace search page.
pub const CANDIDATE_SELECTOR: &str = "a[role='link']";

/// CSS selector for the title text inside a result anchor.
pub const TITLE_SELECTOR: &str = "span[class]";

#[async_trait]
pub trait Browser: Send + Sync {
    type Session: BrowserSession;

    /// Acquires a session. Failure here is a setup error for the whole pass.
    async fn launch(&self) -> Result<Self::Session>;
}

#[async_trait]
pub trait BrowserSession: Send + Sized {
    type Handle: CandidateHandle;

    async fn open_search(&mut self, term: &str) -> Result<()>;

    async fn find_candidates(&mut self) -> Result<Vec<Self::Handle>>;

    /// Releases the session. Called on every exit path of a pass.
    async fn close(self) -> Result<()>;
}

#[async_trait]
pub trait CandidateHandle: Send + Sync {
    async fn href(&self) -> Result<Option<String>>;

    async fn title(&self) -> Result<String>;
}

/// Builds the search page URL for `term` by appending it, form-encoded, to `prefix`.
pub fn search_url(prefix: &str, term: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
    format!("{prefix}{encoded}")
}

/// Resolves scheme-relative and root-relative hrefs against `base_url`.
pub fn absolutize(href: &str, base_url: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}
