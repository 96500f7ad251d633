use std::future::Future;
use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use marketwatch::browser::{HttpBrowser, WebDriverBrowser};
use marketwatch::{
    BackendKind, Browser, Config, HarvestJob, HarvestPipeline, ListingFilter, ListingStore,
    Notifier, PollScheduler, SmtpMailer,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Run a single pass and exit instead of polling
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("marketwatch=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("invalid configuration")?;

    match config.backend {
        BackendKind::WebDriver => {
            let browser = WebDriverBrowser {
                server_url: config.webdriver_url.clone(),
                search_prefix: config.search_url.clone(),
                profile_dir: config.profile_dir.clone(),
                headless: config.headless,
                wait_timeout: config.wait_timeout,
                settle_delay: config.settle_delay,
            };
            run(browser, &config, args.once).await
        }
        BackendKind::Http => {
            let browser = HttpBrowser::new(config.search_url.clone(), config.wait_timeout)?;
            run(browser, &config, args.once).await
        }
    }
}

async fn run<B: Browser>(browser: B, config: &Config, once: bool) -> Result<()> {
    let filter = ListingFilter::new(config.band, config.scan_cap, config.cap_policy);
    let pipeline = HarvestPipeline::new(
        browser,
        ListingStore::new(&config.store_path),
        filter,
        config.search_terms.clone(),
    )
    .with_item_path(config.item_path.clone());

    let notifier = match &config.email {
        Some(email) => {
            let mailer =
                SmtpMailer::new(&email.smtp_host, email.smtp_port, &email.sender, &email.password)?;
            Some(
                Notifier::new(mailer, email.sender.clone(), email.recipients.clone())
                    .with_notify_when_empty(email.notify_when_empty),
            )
        }
        None => {
            warn!("EMAIL_SENDER/EMAIL_PASSWORD not set, notifications disabled");
            None
        }
    };

    let scheduler = PollScheduler::new(HarvestJob::new(pipeline, notifier), config.poll_interval);

    if once {
        let summary = scheduler.run_once().await?;
        info!(admitted = summary.admitted, "single pass complete");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, on_signal).await {
            std::process::exit(130);
        }
    });

    info!("press Ctrl+C to stop, twice to abort the current pass");
    scheduler.run(shutdown).await;
    Ok(())
}

/// First interrupt cancels `shutdown` so the running pass can finish; a second one
/// means the caller should exit right away, which is reported by returning `true`.
async fn watch_interrupts<F, Fut>(mut interrupt: F, shutdown: CancellationToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        warn!(error = %e, "cannot listen for Ctrl+C");
        return false;
    }
    info!("stop requested, finishing current pass");
    shutdown.cancel();

    match interrupt().await {
        Ok(()) => {
            warn!("second stop request, aborting current pass");
            true
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl+C");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::{Ready, ready};

    use super::*;

    /// Replays `signals` in order, then reports the handler as gone.
    fn interrupts(signals: Vec<io::Result<()>>) -> impl FnMut() -> Ready<io::Result<()>> {
        let mut signals = signals.into_iter();
        move || ready(signals.next().unwrap_or_else(|| Err(io::Error::other("handler gone"))))
    }

    #[tokio::test]
    async fn second_interrupt_asks_for_exit() {
        let shutdown = CancellationToken::new();
        let exit = watch_interrupts(interrupts(vec![Ok(()), Ok(())]), shutdown.clone()).await;
        assert!(exit);
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn single_interrupt_only_cancels() {
        let shutdown = CancellationToken::new();
        let exit = watch_interrupts(interrupts(vec![Ok(())]), shutdown.clone()).await;
        assert!(!exit);
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn unavailable_signal_handler_does_not_cancel() {
        let shutdown = CancellationToken::new();
        let exit = watch_interrupts(interrupts(Vec::new()), shutdown.clone()).await;
        assert!(!exit);
        assert!(!shutdown.is_cancelled());
    }
}
