use crate::config::EmailConfig;
use crate::domain::ports::{EmailMessage, Mailer};
use crate::utils::error::{ContractError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// STARTTLS + 帳號密碼登入的 SMTP 寄送，連線設定在寄信時才建立
pub struct SmtpMailer {
    config: EmailConfig,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
                .map_err(|e| ContractError::EmailError {
                    message: format!("Invalid SMTP server '{}': {}", self.config.smtp_server, e),
                })?
                .port(self.config.smtp_port)
                .timeout(Some(Duration::from_secs(self.config.timeout_seconds)));

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| ContractError::EmailError {
            message: format!("Invalid address '{}': {}", address, e),
        })
}

pub fn build_message(message: &EmailMessage) -> Result<Message> {
    if message.to.is_empty() {
        return Err(ContractError::EmailError {
            message: "No recipients configured".to_string(),
        });
    }

    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_PLAIN);
    for recipient in &message.to {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    builder
        .body(message.body.clone())
        .map_err(|e| ContractError::EmailError {
            message: format!("Failed to build message: {}", e),
        })
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let email = build_message(message)?;
        tracing::debug!(
            "Connecting to {}:{}",
            self.config.smtp_server,
            self.config.smtp_port
        );
        self.transport()?
            .send(email)
            .await
            .map_err(|e| ContractError::EmailError {
                message: e.to_string(),
            })?;

        tracing::info!("📧 Email report sent to {}", message.to.join(", "));
        Ok(())
    }
}
