//! Fixed-interval poll loop with per-pass failure containment.
//!
//! ```text
//! Idle ─► RunningPass ─► Sleeping ─► RunningPass ─► ...
//!              │              │
//!              └──── shutdown ┴──► Stopped
//! ```
//!
//! Shutdown is observed before each pass and during the sleep, never mid-pass.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::PassSummary;

#[async_trait]
pub trait Pass: Send + Sync {
    async fn run_pass(&self) -> anyhow::Result<PassSummary>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningPass,
    Sleeping,
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub passes: usize,
    pub failed_passes: usize,
    pub admitted: usize,
}

pub struct PollScheduler<P> {
    job: P,
    interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl<P: Pass> PollScheduler<P> {
    pub fn new(job: P, interval: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self { job, interval, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Runs a single pass and hands its outcome to the caller.
    pub async fn run_once(&self) -> anyhow::Result<PassSummary> {
        self.state.send_replace(SchedulerState::RunningPass);
        let result = self.job.run_pass().await;
        self.state.send_replace(SchedulerState::Stopped);
        result
    }

    /// Polls until `shutdown` is cancelled. No single pass can end the loop.
    pub async fn run(&self, shutdown: CancellationToken) -> SchedulerReport {
        info!(interval_secs = self.interval.as_secs(), "marketplace monitoring started");
        let mut report = SchedulerReport::default();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            self.state.send_replace(SchedulerState::RunningPass);
            report.passes += 1;
            info!(pass = report.passes, "checking for new listings");

            match AssertUnwindSafe(self.job.run_pass()).catch_unwind().await {
                Ok(Ok(summary)) => {
                    report.admitted += summary.admitted;
                    info!(
                        pass = report.passes,
                        admitted = summary.admitted,
                        notified = ?summary.notified,
                        "pass complete"
                    );
                }
                Ok(Err(e)) => {
                    report.failed_passes += 1;
                    error!(pass = report.passes, error = %format!("{e:#}"), "pass failed");
                }
                Err(panic) => {
                    report.failed_passes += 1;
                    error!(pass = report.passes, panic = %panic_message(&*panic), "pass panicked");
                }
            }

            self.state.send_replace(SchedulerState::Sleeping);
            info!(secs = self.interval.as_secs(), "sleeping until next pass");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!(
            passes = report.passes,
            failed = report.failed_passes,
            "marketplace monitoring stopped"
        );
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
