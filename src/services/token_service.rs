use crate::{
    config::AuthConfig,
    error::{ApiError, Result},
};
use entity::sea_orm_active_enums::UserRole;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Identity claims embedded in an issued token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user_id)
    pub sub: String,
    pub email: String,
    /// "student" | "company" | "admin"
    pub role: String,
    pub verified: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity_days: i64,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());

        Self {
            encoding_key,
            decoding_key,
            validity_days: config.token_validity_days,
        }
    }

    pub fn validity_seconds(&self) -> u64 {
        (self.validity_days * 24 * 3600) as u64
    }

    /// Issue a signed identity token, valid for the configured window.
    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        role: UserRole,
        is_verified: bool,
    ) -> Result<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let exp = now + self.validity_days * 24 * 3600;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            verified: is_verified,
            iat: now,
            exp,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(e.into()))?;

        Ok(token)
    }

    /// Verify a token and return its claims.
    ///
    /// Bad signature, malformed payload and expiry all collapse into the
    /// single `Unauthorized` kind; callers must not be able to tell a forged
    /// token apart from an absent one.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(token_data.claims)
    }

    /// Extract user_id from claims
    pub fn user_id_from_claims(claims: &Claims) -> Result<Uuid> {
        Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)
    }

    /// Extract role from claims
    pub fn role_from_claims(claims: &Claims) -> Result<UserRole> {
        match claims.role.as_str() {
            "student" => Ok(UserRole::Student),
            "company" => Ok(UserRole::Company),
            "admin" => Ok(UserRole::Admin),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;

    fn test_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-key-with-minimum-32-characters-required".to_string(),
            token_validity_days: 7,
        }
    }

    #[test]
    fn test_claims_round_trip() {
        let service = TokenService::new(&test_config());
        let user_id = Uuid::new_v4();

        let token = service
            .issue(user_id, "dara@example.com", UserRole::Company, true)
            .unwrap();
        assert!(!token.is_empty());

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "dara@example.com");
        assert_eq!(claims.role, "company");
        assert!(claims.verified);

        assert_eq!(TokenService::user_id_from_claims(&claims).unwrap(), user_id);
        assert_eq!(
            TokenService::role_from_claims(&claims).unwrap(),
            UserRole::Company
        );
    }

    #[test]
    fn test_all_roles_round_trip() {
        let service = TokenService::new(&test_config());
        let user_id = Uuid::new_v4();

        for role in [UserRole::Student, UserRole::Company, UserRole::Admin] {
            let token = service
                .issue(user_id, "x@example.com", role, false)
                .unwrap();
            let claims = service.verify(&token).unwrap();
            assert_eq!(TokenService::role_from_claims(&claims).unwrap(), role);
            assert!(!claims.verified);
        }
    }

    #[test]
    fn test_expired_token_fails_like_missing_token() {
        let service = TokenService::new(&test_config());

        // Hand-roll a token that expired an hour ago, signed with the real key
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "old@example.com".to_string(),
            role: "student".to_string(),
            verified: true,
            iat: now - 8 * 24 * 3600,
            exp: now - 3600,
        };
        let expired = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(test_config().jwt_secret.as_bytes()),
        )
        .unwrap();

        let err = service.verify(&expired).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_foreign_secret_fails_with_same_kind() {
        let service = TokenService::new(&test_config());

        let other = TokenService::new(&AuthConfig {
            jwt_secret: "a-completely-different-signing-secret-value".to_string(),
            token_validity_days: 7,
        });
        let token = other
            .issue(Uuid::new_v4(), "x@example.com", UserRole::Student, true)
            .unwrap();

        let forged_err = service.verify(&token).unwrap_err();
        let garbage_err = service.verify("not.a.token").unwrap_err();

        // Same kind for forged and malformed: clients cannot distinguish them
        assert!(matches!(forged_err, ApiError::Unauthorized));
        assert!(matches!(garbage_err, ApiError::Unauthorized));
        assert_eq!(forged_err.to_string(), garbage_err.to_string());
    }
}
