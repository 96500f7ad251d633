//! Chrome over WebDriver, for result pages that only render client-side.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::ChromiumLikeCapabilities;
use thirtyfour::error::WebDriverErrorInner;
use thirtyfour::prelude::*;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{
    Browser, BrowserError, BrowserSession, CANDIDATE_SELECTOR, CandidateHandle, Result,
    TITLE_SELECTOR, search_url,
};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WebDriverBrowser {
    pub server_url: String,
    pub search_prefix: String,
    /// Chrome user-data directory of an already logged-in profile.
    pub profile_dir: Option<PathBuf>,
    pub headless: bool,
    pub wait_timeout: Duration,
    /// Pause after navigation so lazy-loaded results can attach.
    pub settle_delay: Duration,
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Session = WebDriverSession;

    async fn launch(&self) -> Result<WebDriverSession> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--start-maximized").map_err(setup_error)?;
        if let Some(dir) = &self.profile_dir {
            caps.add_arg(&format!("--user-data-dir={}", dir.display()))
                .map_err(setup_error)?;
            caps.add_arg("--profile-directory=Default").map_err(setup_error)?;
        }
        if self.headless {
            caps.set_headless().map_err(setup_error)?;
        }

        let driver = WebDriver::new(&self.server_url, caps)
            .await
            .map_err(setup_error)?;
        info!(server = %self.server_url, "browser session started");

        Ok(WebDriverSession {
            driver,
            search_prefix: self.search_prefix.clone(),
            wait_timeout: self.wait_timeout,
            settle_delay: self.settle_delay,
        })
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
    search_prefix: String,
    wait_timeout: Duration,
    settle_delay: Duration,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    type Handle = WebDriverCandidate;

    async fn open_search(&mut self, term: &str) -> Result<()> {
        let url = search_url(&self.search_prefix, term);
        self.driver
            .goto(&url)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{url}: {e}")))?;
        info!(query = term, "navigated to search page");
        sleep(self.settle_delay).await;
        Ok(())
    }

    async fn find_candidates(&mut self) -> Result<Vec<WebDriverCandidate>> {
        // Bounded wait for the first anchor; a page that never shows one times out.
        self.driver
            .query(By::Css(CANDIDATE_SELECTOR))
            .wait(self.wait_timeout, WAIT_POLL_INTERVAL)
            .first()
            .await
            .map_err(wait_error)?;

        let elements = self
            .driver
            .find_all(By::Css(CANDIDATE_SELECTOR))
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        Ok(elements.into_iter().map(WebDriverCandidate).collect())
    }

    async fn close(self) -> Result<()> {
        self.driver.quit().await.map_err(|e| {
            warn!(error = %e, "browser did not quit cleanly");
            BrowserError::Navigation(e.to_string())
        })?;
        info!("browser session closed");
        Ok(())
    }
}

pub struct WebDriverCandidate(WebElement);

#[async_trait]
impl CandidateHandle for WebDriverCandidate {
    async fn href(&self) -> Result<Option<String>> {
        self.0.attr("href").await.map_err(field_error)
    }

    async fn title(&self) -> Result<String> {
        let node = self.0.find(By::Css(TITLE_SELECTOR)).await.map_err(field_error)?;
        let text = node.text().await.map_err(field_error)?;
        Ok(text.trim().to_string())
    }
}

fn setup_error(err: WebDriverError) -> BrowserError {
    BrowserError::Setup(err.to_string())
}

fn field_error(err: WebDriverError) -> BrowserError {
    BrowserError::Field(err.to_string())
}

/// Only an element that never showed up is a timeout; a broken session is not.
fn wait_error(err: WebDriverError) -> BrowserError {
    match &*err {
        WebDriverErrorInner::NoSuchElement(_)
        | WebDriverErrorInner::Timeout(_)
        | WebDriverErrorInner::WebDriverTimeout(_) => {
            debug!(error = %err, "no candidate anchor appeared");
            BrowserError::Timeout(CANDIDATE_SELECTOR.to_string())
        }
        _ => BrowserError::Navigation(err.to_string()),
    }
}
