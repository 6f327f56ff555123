//! Notification dispatch
//!
//! Turns [`AlertEvent`]s into e-mails and hands them to a [`MailTransport`].
//! Delivery is best effort: a failed send is logged and counted, never retried
//! and never reported back to the front end that triggered it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::MailConfig;
use crate::evaluator::AlertEvent;
use crate::throttle::ThrottleState;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("cannot build message: {0}")]
    Build(String),

    #[error("mail transport unavailable: {0}")]
    Unavailable(String),
}

/// Subject and body of one outgoing mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_event(event: &AlertEvent) -> Self {
        match event {
            AlertEvent::Load {
                hostname,
                previous,
                current,
            } => Self {
                subject: format!("System load warning on {hostname}"),
                body: format!("System load has reached {current:.2} from {previous:.2}"),
            },
            AlertEvent::Swap {
                hostname,
                previous,
                current,
            } => Self {
                subject: format!("Swap utilization warning on {hostname}"),
                body: format!("Swap utilization has reached {current:.2}% from {previous:.2}%"),
            },
            AlertEvent::Disk {
                hostname,
                mount,
                used_pct,
            } => Self {
                subject: format!("Disk utilization warning on {hostname}"),
                body: format!("Disk utilization on {mount} has reached {used_pct}%"),
            },
        }
    }
}

/// Something that can deliver a notification to the operators
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Plain SMTP relay
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpTransport {
    /// Build the relay from the mail settings
    ///
    /// Addresses are parsed here so a typo in `eMailTo` fails at startup
    /// instead of on the first alert.
    pub fn new(config: &MailConfig) -> Result<Self, NotifyError> {
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .build();

        Ok(Self {
            mailer,
            from: config.from.parse()?,
            to: config.to.parse()?,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Outcome of handing one event to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Sent,
    Failed,

    /// Another evaluation already notified about this mount inside the interval
    Throttled,
}

/// Running totals since startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    pub sent: u64,
    pub failed: u64,
    pub throttled: u64,
}

/// Sends notifications for alert events, claiming disk throttle slots first
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
    throttle: Arc<ThrottleState>,
    disk_report_interval_secs: i64,
    sent: AtomicU64,
    failed: AtomicU64,
    throttled: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn MailTransport>,
        throttle: Arc<ThrottleState>,
        disk_report_interval_secs: i64,
    ) -> Self {
        Self {
            transport,
            throttle,
            disk_report_interval_secs,
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
        }
    }

    pub fn throttle(&self) -> &Arc<ThrottleState> {
        &self.throttle
    }

    /// Deliver one notification per event, in order
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn dispatch(&self, events: &[AlertEvent], now: i64) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(events.len());

        for event in events {
            deliveries.push(self.deliver(event, now).await);
        }

        deliveries
    }

    async fn deliver(&self, event: &AlertEvent, now: i64) -> Delivery {
        if let AlertEvent::Disk { hostname, mount, .. } = event {
            let claimed = self
                .throttle
                .claim(hostname, *mount, now, self.disk_report_interval_secs)
                .await;

            if !claimed {
                debug!("dropping disk alert for {hostname}:{mount}, already notified");
                self.throttled.fetch_add(1, Ordering::Relaxed);
                return Delivery::Throttled;
            }
        }

        let notification = Notification::for_event(event);

        match self.transport.send(&notification).await {
            Ok(()) => {
                info!(host = event.hostname(), subject = %notification.subject, "notification sent");
                self.sent.fetch_add(1, Ordering::Relaxed);
                Delivery::Sent
            }
            Err(e) => {
                error!(host = event.hostname(), subject = %notification.subject, "failed to send notification: {e}");
                self.failed.fetch_add(1, Ordering::Relaxed);
                Delivery::Failed
            }
        }
    }

    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
        }
    }
}
