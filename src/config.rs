use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub email: EmailConfig,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub quota: QuotaConfig,
    pub application: ApplicationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Identity tokens are valid for this many days after issuance.
    pub token_validity_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub merchant_id: String,
    /// Merchant API key, used as the HMAC-SHA512 secret for request signatures.
    pub api_key: String,
    pub base_url: String,
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub api_base: String,
    pub api_key: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
    pub endpoint_url: String,
    pub bucket_name: String,
    #[serde(default)]
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

/// Monthly per-feature invocation limits by plan. Premium is unbounded and
/// has no entries here.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    pub free_resume_feedback_monthly: i32,
    pub free_interview_questions_monthly: i32,
    pub basic_resume_feedback_monthly: i32,
    pub basic_interview_questions_monthly: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationConfig {
    pub base_url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for environment variable overrides)
        dotenvy::dotenv().ok();

        // Build config from config.yml (required) with environment variable overrides
        let config = config::Config::builder()
            // Load config.yml (REQUIRED)
            .add_source(config::File::with_name("config").required(true))
            // Allow environment variables to override config file
            .add_source(
                config::Environment::with_prefix("WORKLINK")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
