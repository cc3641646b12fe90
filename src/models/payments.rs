use entity::sea_orm_active_enums::{PlanTier, TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// "basic" | "premium"
    pub plan: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutData {
    pub transaction: TransactionData,
    /// Signed form fields the client posts to the provider's purchase endpoint.
    pub gateway_endpoint: String,
    pub gateway_fields: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub id: Uuid,
    pub provider_tran_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub plan: Option<PlanTier>,
    pub status: TransactionStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_billing_date: Option<OffsetDateTime>,
    pub auto_renew: Option<bool>,
}

impl From<entity::transactions::Model> for TransactionData {
    fn from(t: entity::transactions::Model) -> Self {
        Self {
            id: t.id,
            provider_tran_id: t.provider_tran_id,
            amount: t.amount,
            currency: t.currency,
            plan: t.plan,
            status: t.status,
            expires_at: t.expires_at,
            next_billing_date: t.next_billing_date,
            auto_renew: t.auto_renew,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanData {
    pub plan: PlanTier,
    pub is_active: bool,
    pub is_expired: bool,
}
