use crate::{
    config::EmailConfig,
    error::{ApiError, Result},
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

/// Thin client for a transactional-mail HTTP API. All sends here are
/// best-effort from the caller's point of view; callers log failures and
/// continue.
pub struct EmailService {
    config: EmailConfig,
    http_client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            config: config.clone(),
            http_client: reqwest::Client::new(),
        }
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        token: Uuid,
        base_url: &str,
    ) -> Result<()> {
        let link = format!("{}/verify-email?token={}", base_url, token);
        self.send(
            to,
            "Verify your Worklink account",
            &format!("Welcome to Worklink! Verify your address: {}", link),
        )
        .await
    }

    pub async fn send_password_reset_email(
        &self,
        to: &str,
        token: Uuid,
        base_url: &str,
    ) -> Result<()> {
        let link = format!("{}/reset-password?token={}", base_url, token);
        self.send(
            to,
            "Reset your Worklink password",
            &format!("A password reset was requested for this address: {}", link),
        )
        .await
    }

    pub async fn send_welcome_email(&self, to: &str) -> Result<()> {
        self.send(
            to,
            "Welcome to Worklink",
            "Your email is verified. Happy job hunting!",
        )
        .await
    }

    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let payload = json!({
            "from": self.config.from_address,
            "to": to,
            "subject": subject,
            "text": body,
        });

        let response = self
            .http_client
            .post(format!("{}/send", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("mail send failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "mail provider returned {}",
                response.status()
            )));
        }

        info!(to, subject, "Email dispatched");

        Ok(())
    }
}
