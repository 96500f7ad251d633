//! Marketplace listing watcher.
//!
//! One pass opens a browser session, walks the candidate anchors of each search results page,
//! prices each title, filters it against a [`PriceBand`] and the persisted dedup ledger, appends
//! the survivors to the record log and hands them to the [`Notifier`]. [`PollScheduler`] repeats
//! that on an interval until shut down.

pub mod browser;
pub mod config;
pub mod filter;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod price;
pub mod scheduler;
pub mod store;

pub use browser::{Browser, BrowserError, BrowserSession, CandidateHandle};
pub use config::{BackendKind, Config, ConfigError};
pub use filter::{CapPolicy, ListingFilter, PriceBand, Verdict};
pub use model::{DedupIndex, ListingRecord, NormalizedKey};
pub use notify::{Mailer, Notification, NotifyError, Notifier, SmtpMailer};
pub use pipeline::{HarvestError, HarvestJob, HarvestPipeline, PassSummary};
pub use scheduler::{Pass, PollScheduler, SchedulerReport, SchedulerState};
pub use store::{ListingStore, StoreError, normalize};
