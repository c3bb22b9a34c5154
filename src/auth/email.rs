//! # Outbound Email
//!
//! Signup hands mail to an [`EmailSender`], which only enqueues it. An
//! [`EmailWorker`] drains the queue in the background and delivers through
//! a [`MailTransport`]. Delivery failures are logged by the worker and
//! never reach the code that queued the mail.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::errors::{AuthError, AuthResult};
use crate::config::SmtpConfig;

/// Default number of mails buffered between signup and delivery
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ==================
// Messages
// ==================

/// Mails this service sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailTemplate {
    /// Welcome mail carrying the signup verification code
    Verification {
        user_email: String,
        code: String,
        expires_minutes: i64,
    },
}

impl EmailTemplate {
    /// Render into an addressed message
    pub fn render(&self) -> OutboundEmail {
        match self {
            EmailTemplate::Verification {
                user_email,
                code,
                expires_minutes,
            } => OutboundEmail {
                to: user_email.clone(),
                subject: "Welcome!".to_string(),
                body: format!(
                    "Use this code to verify your account. Code: {}\n\nThe code expires in {} minute(s).",
                    code, expires_minutes
                ),
            },
        }
    }
}

/// A rendered mail ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

// ==================
// Sender (request side)
// ==================

/// Fire-and-forget mail submission. `send` must not block on delivery.
pub trait EmailSender: Send + Sync {
    fn send(&self, template: EmailTemplate) -> AuthResult<()>;
}

/// Sender that pushes onto the worker's bounded queue
#[derive(Clone)]
pub struct QueuedEmailSender {
    tx: mpsc::Sender<OutboundEmail>,
}

impl EmailSender for QueuedEmailSender {
    fn send(&self, template: EmailTemplate) -> AuthResult<()> {
        self.tx.try_send(template.render()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AuthError::Email("mail queue is full".to_string()),
            mpsc::error::TrySendError::Closed(_) => {
                AuthError::Email("mail worker has stopped".to_string())
            }
        })
    }
}

// ==================
// Transports (worker side)
// ==================

/// Something that can actually deliver a mail
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, email: &OutboundEmail) -> AuthResult<()>;
}

/// SMTP delivery with STARTTLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> AuthResult<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| AuthError::Config(format!("EMAIL_FROM: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| AuthError::Config(format!("EMAIL_HOST: {}", e)))?
            .port(config.port);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, email: &OutboundEmail) -> AuthResult<()> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AuthError::Email(format!("bad recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| AuthError::Email(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AuthError::Email(e.to_string()))?;
        Ok(())
    }
}

/// Transport used when no SMTP server is configured
pub struct LogMailer;

#[async_trait]
impl MailTransport for LogMailer {
    async fn deliver(&self, email: &OutboundEmail) -> AuthResult<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "smtp not configured, mail not sent");
        Ok(())
    }
}

/// Pick the transport for the given SMTP settings
pub fn transport_from_config(smtp: Option<&SmtpConfig>) -> AuthResult<Arc<dyn MailTransport>> {
    match smtp {
        Some(config) => Ok(Arc::new(SmtpMailer::new(config)?)),
        None => Ok(Arc::new(LogMailer)),
    }
}

// ==================
// Worker
// ==================

/// Background task delivering queued mail
pub struct EmailWorker {
    rx: mpsc::Receiver<OutboundEmail>,
    transport: Arc<dyn MailTransport>,
}

/// Create a connected sender/worker pair
pub fn email_queue(
    capacity: usize,
    transport: Arc<dyn MailTransport>,
) -> (QueuedEmailSender, EmailWorker) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueuedEmailSender { tx }, EmailWorker { rx, transport })
}

impl EmailWorker {
    /// Deliver until cancelled (or every sender is gone).
    ///
    /// On cancellation the queue is closed and mail already queued is
    /// still delivered.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("email worker started");
        let mut closing = false;
        loop {
            let next = if closing {
                self.rx.recv().await
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        self.rx.close();
                        closing = true;
                        continue;
                    }
                    next = self.rx.recv() => next,
                }
            };

            let Some(email) = next else { break };
            match self.transport.deliver(&email).await {
                Ok(()) => tracing::info!(to = %email.to, subject = %email.subject, "email sent"),
                Err(e) => tracing::error!(to = %email.to, error = %e, "failed to send email"),
            }
        }
        tracing::info!("email worker stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
