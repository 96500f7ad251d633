//! Static-HTML backend: fetches the search page over HTTP and selects candidate anchors
//! from the markup. No script execution, so it only sees what the server renders.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{
    Browser, BrowserError, BrowserSession, CANDIDATE_SELECTOR, CandidateHandle, Result,
    TITLE_SELECTOR, absolutize, search_url,
};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct HttpBrowser {
    client: reqwest::Client,
    search_prefix: String,
}

impl HttpBrowser {
    pub fn new(search_prefix: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrowserError::Setup(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            search_prefix: search_prefix.into(),
        })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    type Session = HttpSession;

    async fn launch(&self) -> Result<HttpSession> {
        Ok(HttpSession {
            client: self.client.clone(),
            search_prefix: self.search_prefix.clone(),
            page: None,
        })
    }
}

pub struct HttpSession {
    client: reqwest::Client,
    search_prefix: String,
    page: Option<FetchedPage>,
}

struct FetchedPage {
    url: String,
    html: String,
}

impl HttpSession {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BrowserError::Navigation(format!("{url} returned {status}")));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    type Handle = HttpCandidate;

    async fn open_search(&mut self, term: &str) -> Result<()> {
        let url = search_url(&self.search_prefix, term);
        let html = self.fetch_html(&url).await?;
        debug!(url = %url, bytes = html.len(), "fetched search page");
        self.page = Some(FetchedPage { url, html });
        Ok(())
    }

    async fn find_candidates(&mut self) -> Result<Vec<HttpCandidate>> {
        let Some(page) = self.page.as_ref() else {
            warn!("find_candidates called before open_search");
            return Ok(Vec::new());
        };
        Ok(parse_candidates(&page.html, &origin_of(&page.url)))
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}

/// A result anchor captured from static markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpCandidate {
    pub href: Option<String>,
    pub title: Option<String>,
}

#[async_trait]
impl CandidateHandle for HttpCandidate {
    async fn href(&self) -> Result<Option<String>> {
        Ok(self.href.clone())
    }

    async fn title(&self) -> Result<String> {
        self.title
            .clone()
            .ok_or_else(|| BrowserError::Field(format!("no {TITLE_SELECTOR} element")))
    }
}

/// Selects every result anchor in `html`, resolving relative hrefs against `base_url`.
pub fn parse_candidates(html: &str, base_url: &str) -> Vec<HttpCandidate> {
    let document = Html::parse_document(html);
    let (Ok(anchor_selector), Ok(title_selector)) =
        (Selector::parse(CANDIDATE_SELECTOR), Selector::parse(TITLE_SELECTOR))
    else {
        return Vec::new();
    };

    document
        .select(&anchor_selector)
        .map(|anchor| HttpCandidate {
            href: anchor
                .value()
                .attr("href")
                .map(|href| absolutize(href, base_url)),
            title: get_text(anchor, &title_selector),
        })
        .collect()
}

fn get_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let node = element.select(selector).next()?;
    let text: String = node.text().collect::<Vec<_>>().join(" ");
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() { None } else { Some(cleaned) }
}

fn origin_of(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.origin().ascii_serialization(),
        Err(_) => String::new(),
    }
}
