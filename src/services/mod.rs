// Service modules
pub mod account_service;
pub mod ai_service;
pub mod credential;
pub mod email_service;
pub mod payment_gateway;
pub mod quota_service;
pub mod storage_service;
pub mod subscription_service;
pub mod token_service;

pub use account_service::AccountService;
pub use ai_service::AiService;
pub use email_service::EmailService;
pub use payment_gateway::PaymentGateway;
pub use quota_service::QuotaService;
pub use storage_service::StorageService;
pub use subscription_service::SubscriptionService;
pub use token_service::TokenService;
