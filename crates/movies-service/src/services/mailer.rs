//! Outbound mail collaborator.
//!
//! Delivery happens on the background supervisor, never on the request path.
//! [`SmtpMailer`] delivers through the configured relay. [`LogMailer`] only
//! records the dispatch with the recipient hashed, for development setups
//! without a relay.

use crate::config::SmtpConfig;
use crate::observability::hash_for_correlation;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Attempts per message before the delivery is given up.
pub const MAX_SEND_ATTEMPTS: u32 = 3;

/// Pause between delivery attempts.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Per-connection SMTP timeout.
const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

const ACTIVATION_SUBJECT: &str = "Welcome to Movies! Activate your account";

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid mailer configuration: {0}")]
    Config(String),
}

/// Trait for mail delivery (enables mocking).
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    /// Send the activation token to a newly registered user.
    async fn send_activation(
        &self,
        recipient: &str,
        name: &str,
        token: &SecretString,
    ) -> Result<(), MailerError>;
}

/// Mailer that delivers through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailerError> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| MailerError::Config(format!("SMTP_SENDER is not a mailbox: {}", e)))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailerError::Config(format!("Invalid SMTP relay: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
        };
        builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, name = "movies.mailer.send_activation")]
    async fn send_activation(
        &self,
        recipient: &str,
        name: &str,
        token: &SecretString,
    ) -> Result<(), MailerError> {
        let message = activation_message(&self.sender, recipient, name, token)?;
        let recipient_hash = hash_for_correlation(recipient);

        let mut last_error = String::new();
        for attempt in 1..=MAX_SEND_ATTEMPTS {
            match self.transport.send(message.clone()).await {
                Ok(_) => {
                    info!(
                        target: "movies.mailer",
                        recipient_hash = %recipient_hash,
                        attempt = attempt,
                        "Activation email delivered"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        target: "movies.mailer",
                        recipient_hash = %recipient_hash,
                        attempt = attempt,
                        error = %e,
                        "Activation email attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < MAX_SEND_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(MailerError::Delivery(last_error))
    }
}

/// Build the activation email. The token goes in the body and nowhere else.
pub fn activation_message(
    sender: &Mailbox,
    recipient: &str,
    name: &str,
    token: &SecretString,
) -> Result<Message, MailerError> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|e| MailerError::Delivery(format!("Invalid recipient address: {}", e)))?;

    let body = format!(
        "Hi {name},\n\n\
         Thanks for signing up for a Movies account.\n\n\
         To activate your account, send a PUT request to /v1/users/activated \
         with the following JSON body:\n\n\
         {{\"token\": \"{token}\"}}\n\n\
         This token is valid for 2 days and can only be used once.\n",
        name = name,
        token = token.expose_secret(),
    );

    Message::builder()
        .from(sender.clone())
        .to(to)
        .subject(ACTIVATION_SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| MailerError::Delivery(format!("Failed to build message: {}", e)))
}

/// Mailer that only logs the dispatch.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    #[instrument(skip_all, name = "movies.mailer.send_activation")]
    async fn send_activation(
        &self,
        recipient: &str,
        _name: &str,
        _token: &SecretString,
    ) -> Result<(), MailerError> {
        info!(
            target: "movies.mailer",
            recipient_hash = %hash_for_correlation(recipient),
            template = "user_welcome",
            "Activation email dispatched"
        );
        Ok(())
    }
}

/// Mock mailers for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every activation token it is asked to send.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Most recent activation token sent to `recipient`.
        pub fn activation_token_for(&self, recipient: &str) -> Option<String> {
            let sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
            sent.iter()
                .rev()
                .find(|(to, _)| to == recipient)
                .map(|(_, token)| token.clone())
        }

        pub fn sent_count(&self) -> usize {
            self.sent.lock().unwrap_or_else(|p| p.into_inner()).len()
        }
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send_activation(
            &self,
            recipient: &str,
            _name: &str,
            token: &SecretString,
        ) -> Result<(), MailerError> {
            self.sent
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push((recipient.to_string(), token.expose_secret().to_string()));
            Ok(())
        }
    }

    /// Panics on every send. Exercises the supervisor's fault boundary.
    #[derive(Debug, Default)]
    pub struct PanickingMailer {
        call_count: AtomicUsize,
    }

    impl PanickingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Mailer for PanickingMailer {
        #[allow(clippy::panic)]
        async fn send_activation(
            &self,
            _recipient: &str,
            _name: &str,
            _token: &SecretString,
        ) -> Result<(), MailerError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            panic!("mail relay exploded");
        }
    }

    /// Always returns a delivery error.
    #[derive(Debug, Default)]
    pub struct FailingMailer;

    #[async_trait::async_trait]
    impl Mailer for FailingMailer {
        async fn send_activation(
            &self,
            _recipient: &str,
            _name: &str,
            _token: &SecretString,
        ) -> Result<(), MailerError> {
            Err(MailerError::Delivery("connection refused".to_string()))
        }
    }
}
