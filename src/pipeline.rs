//! One harvest pass: scan every search term, filter, then persist the survivors in one batch.

use std::panic::{self, AssertUnwindSafe};

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::browser::{Browser, BrowserError, BrowserSession, CandidateHandle};
use crate::filter::{CapPolicy, ListingFilter, PricedCandidate, Verdict};
use crate::model::{DedupIndex, ListingRecord};
use crate::notify::{Mailer, Notifier};
use crate::price;
use crate::scheduler::Pass;
use crate::store::{ListingStore, StoreError, normalize};

pub const DEFAULT_ITEM_PATH: &str = "marketplace/item";

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("could not start browser session: {0}")]
    Setup(#[source] BrowserError),

    #[error("browser failed mid-pass: {0}")]
    Browser(#[source] BrowserError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct HarvestPipeline<B> {
    browser: B,
    store: ListingStore,
    filter: ListingFilter,
    queries: Vec<String>,
    item_path: String,
}

/// Mutable state threaded through the candidates of one pass.
struct PassState {
    seen: DedupIndex,
    counted: usize,
    admitted: Vec<ListingRecord>,
}

enum Scan {
    Continue,
    CapReached,
}

impl<B: Browser> HarvestPipeline<B> {
    pub fn new(
        browser: B,
        store: ListingStore,
        filter: ListingFilter,
        queries: Vec<String>,
    ) -> Self {
        Self {
            browser,
            store,
            filter,
            queries,
            item_path: DEFAULT_ITEM_PATH.to_string(),
        }
    }

    pub fn with_item_path(mut self, item_path: impl Into<String>) -> Self {
        self.item_path = item_path.into();
        self
    }

    pub fn store(&self) -> &ListingStore {
        &self.store
    }

    /// Runs every query through one browser session and appends what was admitted.
    ///
    /// The session is closed before the batch write on every exit path, including a panic
    /// raised while scanning, which is resumed once the session is released.
    pub async fn run_pass(&self) -> Result<Vec<ListingRecord>, HarvestError> {
        let mut session = self.browser.launch().await.map_err(HarvestError::Setup)?;

        let scanned = AssertUnwindSafe(self.scan_queries(&mut session))
            .catch_unwind()
            .await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close browser session");
        }

        let admitted = match scanned {
            Ok(result) => result?,
            Err(payload) => panic::resume_unwind(payload),
        };
        if admitted.is_empty() {
            info!("no new valid listings found");
        } else {
            self.store.append(&admitted)?;
            info!(count = admitted.len(), "added new valid listings");
        }
        Ok(admitted)
    }

    async fn scan_queries(
        &self,
        session: &mut B::Session,
    ) -> Result<Vec<ListingRecord>, HarvestError> {
        let mut state = PassState {
            seen: self.store.load_known_keys()?,
            counted: 0,
            admitted: Vec::new(),
        };

        for query in &self.queries {
            if self.filter.cap_reached(state.counted) {
                info!(
                    query = %query,
                    cap = self.filter.cap(),
                    "scan cap reached, skipping query"
                );
                continue;
            }

            let handles = match self.fetch_candidates(session, query).await {
                Ok(handles) => handles,
                Err(e) if e.is_timeout() => {
                    warn!(query = %query, error = %e, "timed out, no candidates for query");
                    continue;
                }
                Err(e) => return Err(HarvestError::Browser(e)),
            };
            info!(query = %query, found = handles.len(), "found candidates");

            for handle in &handles {
                if let Scan::CapReached = self.scan_candidate(handle, &mut state).await {
                    info!(query = %query, cap = self.filter.cap(), "scan cap reached");
                    break;
                }
            }
        }

        Ok(state.admitted)
    }

    async fn fetch_candidates(
        &self,
        session: &mut B::Session,
        query: &str,
    ) -> Result<Vec<<B::Session as BrowserSession>::Handle>, BrowserError> {
        session.open_search(query).await?;
        session.find_candidates().await
    }

    async fn scan_candidate<H: CandidateHandle>(&self, handle: &H, state: &mut PassState) -> Scan {
        if self.filter.cap_reached(state.counted) {
            return Scan::CapReached;
        }
        if self.filter.policy() == CapPolicy::Scanned {
            state.counted += 1;
        }

        let href = match handle.href().await {
            Ok(Some(href)) if href.contains(&self.item_path) => href,
            Ok(Some(href)) => {
                debug!(href = %href, "skipping non-listing link");
                return Scan::Continue;
            }
            Ok(None) => {
                debug!("skipping link without href");
                return Scan::Continue;
            }
            Err(e) => {
                warn!(error = %e, "error processing item");
                return Scan::Continue;
            }
        };

        let key = normalize(&href);
        if state.seen.contains(&key) {
            debug!(url = %key, "skipping known listing");
            return Scan::Continue;
        }

        let title = match handle.title().await {
            Ok(title) if !title.is_empty() => title,
            Ok(_) => {
                warn!(url = %key, "skipping listing with empty title");
                return Scan::Continue;
            }
            Err(e) => {
                warn!(url = %key, error = %e, "error processing item");
                return Scan::Continue;
            }
        };

        let price = price::extract(&title);
        let counted_before = match self.filter.policy() {
            CapPolicy::Admitted => state.counted,
            // This candidate is already counted; the cap applies to those before it.
            CapPolicy::Scanned => state.counted - 1,
        };
        let candidate = PricedCandidate { key: &key, price };
        let verdict = self.filter.admit(&candidate, &state.seen, counted_before);

        match verdict {
            Verdict::Admitted => {
                info!(title = %title, price = ?price, "new valid listing found");
                state.seen.insert(key);
                state.admitted.push(ListingRecord::new(title, href));
                if self.filter.policy() == CapPolicy::Admitted {
                    state.counted += 1;
                }
            }
            rejected => info!(title = %title, reason = %rejected, "skipping listing"),
        }
        Scan::Continue
    }
}

/// What a completed pass produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub admitted: usize,
    /// `None` when no notifier is configured.
    pub notified: Option<bool>,
}

/// A pass followed by notification, as run by the scheduler.
pub struct HarvestJob<B, M> {
    pipeline: HarvestPipeline<B>,
    notifier: Option<Notifier<M>>,
}

impl<B: Browser, M: Mailer> HarvestJob<B, M> {
    pub fn new(pipeline: HarvestPipeline<B>, notifier: Option<Notifier<M>>) -> Self {
        Self { pipeline, notifier }
    }

    pub fn pipeline(&self) -> &HarvestPipeline<B> {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<PassSummary, HarvestError> {
        let admitted = self.pipeline.run_pass().await?;
        let notified = match &self.notifier {
            Some(notifier) => Some(notifier.notify(&admitted).await),
            None => None,
        };
        Ok(PassSummary {
            admitted: admitted.len(),
            notified,
        })
    }
}

#[async_trait]
impl<B: Browser, M: Mailer> Pass for HarvestJob<B, M> {
    async fn run_pass(&self) -> anyhow::Result<PassSummary> {
        Ok(self.run().await?)
    }
}
