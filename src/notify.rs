//! Email summary of newly admitted listings.
//!
//! Delivery is best effort: [`Notifier::notify`] reports failure as `false` and never returns
//! an error, since the listings it reports on are already persisted.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::model::ListingRecord;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// A rendered email, independent of transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub recipients: Vec<String>,
}

impl Notification {
    pub fn for_listings(records: &[ListingRecord], sender: &str, recipients: &[String]) -> Self {
        let subject = format!("New listings found on Marketplace ({})!", records.len());
        let body = records
            .iter()
            .map(|r| format!("{} - {}", r.title, r.url))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            subject,
            body,
            sender: sender.to_string(),
            recipients: recipients.to_vec(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// SMTP over implicit TLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&notification.sender)?)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &notification.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        let message = builder
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

pub struct Notifier<M> {
    mailer: M,
    sender: String,
    recipients: Vec<String>,
    notify_when_empty: bool,
}

impl<M: Mailer> Notifier<M> {
    pub fn new(mailer: M, sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            mailer,
            sender: sender.into(),
            recipients,
            notify_when_empty: false,
        }
    }

    pub fn with_notify_when_empty(mut self, notify_when_empty: bool) -> Self {
        self.notify_when_empty = notify_when_empty;
        self
    }

    /// Sends the summary for `records`. Returns whether delivery succeeded; skipping because
    /// there is nothing to say or nobody to tell counts as success.
    pub async fn notify(&self, records: &[ListingRecord]) -> bool {
        if records.is_empty() && !self.notify_when_empty {
            debug!("no new listings, skipping notification");
            return true;
        }
        if self.recipients.is_empty() {
            debug!("no recipients configured, skipping notification");
            return true;
        }

        let notification = Notification::for_listings(records, &self.sender, &self.recipients);
        match self.mailer.send(&notification).await {
            Ok(()) => {
                info!(
                    listings = records.len(),
                    recipients = self.recipients.len(),
                    "notification sent"
                );
                true
            }
            Err(e) => {
                error!(error = %e, listings = records.len(), "failed to send notification");
                false
            }
        }
    }
}
