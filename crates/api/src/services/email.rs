//! Email service for account verification and password reset messages.
//!
//! Only the `console` provider is built in: it writes the message to the
//! log, which is how links reach developers running the server locally.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::EmailConfig;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email provider not supported: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub body_text: String,
}

#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    app_base_url: String,
}

impl EmailService {
    pub fn new(config: EmailConfig, app_base_url: &str) -> Self {
        Self {
            config: Arc::new(config),
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        if !self.config.enabled {
            debug!(subject = %message.subject, "Email service disabled, skipping send");
            return Ok(());
        }

        match self.config.provider.as_str() {
            "console" => {
                self.send_console(&message);
                Ok(())
            }
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(EmailError::UnsupportedProvider(provider.to_string()))
            }
        }
    }

    pub async fn send_verification_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        token: &str,
    ) -> Result<(), EmailError> {
        self.send(self.verification_message(to_email, to_name, token))
            .await
    }

    pub async fn send_password_reset_email(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        token: &str,
    ) -> Result<(), EmailError> {
        self.send(self.password_reset_message(to_email, to_name, token))
            .await
    }

    fn verification_message(&self, to: &str, to_name: Option<&str>, token: &str) -> EmailMessage {
        let url = format!("{}/auth/verify-email?token={}", self.app_base_url, token);
        EmailMessage {
            to: to.to_string(),
            to_name: to_name.map(str::to_string),
            subject: "Confirm your Dining Journal account".to_string(),
            body_text: format!(
                "Hi{name},\n\n\
                 Confirm your email address to start logging family meals:\n\n\
                 {url}\n\n\
                 This link expires in 24 hours.\n",
                name = greeting_name(to_name),
            ),
        }
    }

    fn password_reset_message(
        &self,
        to: &str,
        to_name: Option<&str>,
        token: &str,
    ) -> EmailMessage {
        let url = format!("{}/auth/reset-password?token={}", self.app_base_url, token);
        EmailMessage {
            to: to.to_string(),
            to_name: to_name.map(str::to_string),
            subject: "Reset your Dining Journal password".to_string(),
            body_text: format!(
                "Hi{name},\n\n\
                 Someone asked to reset the password for this account. \
                 If it was you, choose a new password here:\n\n\
                 {url}\n\n\
                 This link expires in 1 hour. If you did not ask for a reset, ignore this email.\n",
                name = greeting_name(to_name),
            ),
        }
    }

    fn send_console(&self, message: &EmailMessage) {
        info!(
            to = %message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );
        info!(body_text = %message.body_text, "Email body");
    }
}

fn greeting_name(name: Option<&str>) -> String {
    name.map(|n| format!(" {}", n)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: "console".to_string(),
            sender_email: "test@example.com".to_string(),
            sender_name: "Test".to_string(),
        }
    }

    #[test]
    fn test_verification_link_uses_app_url() {
        let service = EmailService::new(test_config(), "https://journal.example.com/");
        let message = service.verification_message("ana@example.com", Some("Ana"), "tok123");

        assert_eq!(message.to, "ana@example.com");
        assert!(message.body_text.starts_with("Hi Ana,"));
        assert!(message
            .body_text
            .contains("https://journal.example.com/auth/verify-email?token=tok123"));
    }

    #[test]
    fn test_reset_link() {
        let service = EmailService::new(test_config(), "http://localhost:3000");
        let message = service.password_reset_message("ana@example.com", None, "r3s3t");

        assert!(message.body_text.starts_with("Hi,"));
        assert!(message
            .body_text
            .contains("http://localhost:3000/auth/reset-password?token=r3s3t"));
    }

    #[tokio::test]
    async fn test_send_console_email() {
        let service = EmailService::new(test_config(), "http://localhost:3000");
        assert!(service.is_enabled());
        assert!(service
            .send_verification_email("user@example.com", Some("Test User"), "token")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_send_disabled_silently_succeeds() {
        let mut config = test_config();
        config.enabled = false;
        config.provider = "carrier-pigeon".to_string();
        let service = EmailService::new(config, "http://localhost:3000");

        assert!(service
            .send_password_reset_email("user@example.com", None, "token")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_unknown_provider_fails() {
        let mut config = test_config();
        config.provider = "carrier-pigeon".to_string();
        let service = EmailService::new(config, "http://localhost:3000");

        let result = service
            .send_password_reset_email("user@example.com", None, "token")
            .await;
        assert!(matches!(result, Err(EmailError::UnsupportedProvider(_))));
    }
}
