use crate::{
    config::Config,
    services::{
        AccountService, AiService, EmailService, PaymentGateway, QuotaService, StorageService,
        SubscriptionService, TokenService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub token_service: Arc<TokenService>,
    pub account_service: Arc<AccountService>,
    pub payment_gateway: Arc<PaymentGateway>,
    pub subscription_service: Arc<SubscriptionService>,
    pub quota_service: Arc<QuotaService>,
    pub email_service: Arc<EmailService>,
    pub ai_service: Arc<AiService>,
    pub storage_service: Arc<StorageService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;

        // Initialize services. Provider clients are built once here and
        // injected; nothing holds ambient global state.
        let token_service = Arc::new(TokenService::new(&config.auth));
        let email_service = Arc::new(EmailService::new(&config.email));
        let payment_gateway = Arc::new(PaymentGateway::new(&config.payment));
        let subscription_service = Arc::new(SubscriptionService::new(
            db.clone(),
            payment_gateway.clone(),
        ));
        let quota_service = Arc::new(QuotaService::new(db.clone(), &config.quota));
        let account_service = Arc::new(AccountService::new(
            db.clone(),
            token_service.clone(),
            email_service.clone(),
            config.application.base_url.clone(),
        ));
        let ai_service = Arc::new(AiService::new(&config.ai));
        let storage_service = Arc::new(StorageService::new(&config.storage).await?);

        Ok(Self {
            db,
            token_service,
            account_service,
            payment_gateway,
            subscription_service,
            quota_service,
            email_service,
            ai_service,
            storage_service,
            config: Arc::new(config),
        })
    }
}
