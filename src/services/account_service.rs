use crate::{
    error::{ApiError, Result},
    services::{
        credential::{hash_password, validate_password_strength, verify_password},
        email_service::EmailService,
        token_service::TokenService,
    },
};
use entity::sea_orm_active_enums::UserRole;
use entity::users;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Lifetime of a password-reset token.
const RESET_TOKEN_VALIDITY: Duration = Duration::hours(1);

/// Uniform response for the reset/verification flows, returned whether or not
/// the target account exists (account-enumeration hardening).
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that address, a reset link has been sent";

pub struct AccountService {
    db: DatabaseConnection,
    token_service: Arc<TokenService>,
    email_service: Arc<EmailService>,
    base_url: String,
}

impl AccountService {
    pub fn new(
        db: DatabaseConnection,
        token_service: Arc<TokenService>,
        email_service: Arc<EmailService>,
        base_url: String,
    ) -> Self {
        Self {
            db,
            token_service,
            email_service,
            base_url,
        }
    }

    /// Create an unverified account and send the verification e-mail.
    /// The e-mail send is best-effort: a mail-provider failure is logged and
    /// never fails the registration.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
        full_name: Option<String>,
    ) -> Result<users::Model> {
        validate_password_strength(password)?;

        if role == UserRole::Admin {
            return Err(ApiError::Validation(
                "Admin accounts cannot be self-registered".to_string(),
            ));
        }

        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(ApiError::Validation(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let verification_token = Uuid::new_v4();

        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            password_hash: Set(hash_password(password)?),
            role: Set(role),
            full_name: Set(full_name),
            is_verified: Set(false),
            verification_token: Set(Some(verification_token)),
            reset_token: Set(None),
            reset_token_expires_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        if let Err(e) = self
            .email_service
            .send_verification_email(email, verification_token, &self.base_url)
            .await
        {
            warn!("Verification email to {} failed: {}", email, e);
        }

        info!(user_id = %user.id, role = role.as_str(), "User registered");

        Ok(user)
    }

    /// Verify credentials and issue an identity token. Unknown address and
    /// wrong password produce the same 401.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, users::Model)> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::Unauthorized);
        }

        let token = self
            .token_service
            .issue(user.id, &user.email, user.role, user.is_verified)?;

        Ok((token, user))
    }

    /// Redeem a verification token. The welcome e-mail after a successful
    /// verification is fire-and-forget: its failure is logged, never
    /// surfaced, since it must not fail the verification itself.
    #[instrument(skip(self))]
    pub async fn verify_email(&self, token: Uuid) -> Result<users::Model> {
        let user = users::Entity::find()
            .filter(users::Column::VerificationToken.eq(token))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Verification token not found".to_string()))?;

        let email = user.email.clone();
        let mut active: users::ActiveModel = user.into();
        active.is_verified = Set(true);
        active.verification_token = Set(None);
        active.updated_at = Set(OffsetDateTime::now_utc());
        let user = active.update(&self.db).await?;

        if let Err(e) = self.email_service.send_welcome_email(&email).await {
            warn!("Welcome email to {} failed (ignored): {}", email, e);
        }

        Ok(user)
    }

    /// Store a reset token and mail it. Always succeeds with the same
    /// message, whether or not the address is registered.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        let Some(user) = user else {
            // Deliberately indistinguishable from the found case
            return Ok(());
        };

        let token = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let mut active: users::ActiveModel = user.into();
        active.reset_token = Set(Some(token));
        active.reset_token_expires_at = Set(Some(now + RESET_TOKEN_VALIDITY));
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        if let Err(e) = self
            .email_service
            .send_password_reset_email(email, token, &self.base_url)
            .await
        {
            warn!("Password reset email to {} failed: {}", email, e);
        }

        Ok(())
    }

    /// Redeem a reset token and set a new password.
    #[instrument(skip(self, new_password))]
    pub async fn complete_password_reset(&self, token: Uuid, new_password: &str) -> Result<()> {
        validate_password_strength(new_password)?;

        let user = users::Entity::find()
            .filter(users::Column::ResetToken.eq(token))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Reset token not found".to_string()))?;

        let now = OffsetDateTime::now_utc();
        let expired = user
            .reset_token_expires_at
            .map(|t| t <= now)
            .unwrap_or(true);
        if expired {
            return Err(ApiError::Validation("Reset token has expired".to_string()));
        }

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash_password(new_password)?);
        active.reset_token = Set(None);
        active.reset_token_expires_at = Set(None);
        active.updated_at = Set(now);
        active.update(&self.db).await?;

        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }
}
