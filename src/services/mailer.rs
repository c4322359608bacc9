use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::warn;

use crate::config::{SmtpConfig, SmtpSecurity};
use crate::error::AppError;
use crate::services::order::Notification;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP credentials not configured")]
    NotConfigured,
    #[error("Invalid mail address {0}")]
    Address(String),
    #[error("Failed to build message: {0}")]
    Build(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        AppError::Mail(err.to_string())
    }
}

/// Delivers order notifications to the shop owner.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), MailError>;
}

struct SmtpRoute {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

pub struct SmtpMailer {
    route: Option<SmtpRoute>,
}

impl SmtpMailer {
    /// Without a password the mailer is built but every send fails with
    /// [`MailError::NotConfigured`].
    pub fn from_config(config: &SmtpConfig) -> Result<Self, MailError> {
        if config.password.is_empty() {
            warn!("SMTP_PASS not set, order notifications will not be delivered");
            return Ok(Self { route: None });
        }

        let builder = match config.security {
            SmtpSecurity::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            }
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                config.host.as_str(),
            )),
        }
        .map_err(|err| MailError::Transport(err.to_string()))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();

        Ok(Self {
            route: Some(SmtpRoute {
                transport,
                from: Mailbox::new(Some(config.from_name.clone()), parse_address(&config.from)?),
                to: Mailbox::new(None, parse_address(&config.recipient)?),
            }),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> Result<(), MailError> {
        let route = self.route.as_ref().ok_or(MailError::NotConfigured)?;

        let mut builder = Message::builder()
            .from(route.from.clone())
            .to(route.to.clone())
            .subject(notification.subject.clone());
        if let Some(reply_to) = &notification.reply_to {
            builder = builder.reply_to(Mailbox::new(
                Some(reply_to.name.clone()),
                parse_address(&reply_to.email)?,
            ));
        }

        let message = builder
            .multipart(MultiPart::alternative_plain_html(
                notification.text.clone(),
                notification.html.clone(),
            ))
            .map_err(|err| MailError::Build(err.to_string()))?;

        route
            .transport
            .send(message)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        Ok(())
    }
}

fn parse_address(address: &str) -> Result<Address, MailError> {
    address
        .trim()
        .parse()
        .map_err(|_| MailError::Address(address.to_owned()))
}
