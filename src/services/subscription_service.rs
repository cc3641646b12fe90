use crate::{
    error::{ApiError, Result},
    services::payment_gateway::PaymentGateway,
};
use entity::sea_orm_active_enums::{PlanTier, TransactionStatus, UserRole};
use entity::transactions;
use rust_decimal::Decimal;
use sea_orm::{entity::*, query::*, DatabaseConnection};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Date, Month, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

/// What the provider's authoritative report says about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    Completed,
    Failed,
}

/// Map a raw provider response onto an outcome.
///
/// Returns `None` when no interpretable status is present; the caller must
/// then leave the transaction unchanged rather than guess.
pub fn interpret_provider_status(response: &Value) -> Option<ProviderOutcome> {
    // Top-level numeric status: 0 means approved
    if let Some(status) = response.get("status") {
        if status.as_i64() == Some(0) {
            return Some(ProviderOutcome::Completed);
        }
        // Envelope variant: { "status": { "code": "00", ... } }
        if status.get("code").and_then(Value::as_str) == Some("00") {
            return Some(ProviderOutcome::Completed);
        }
    }

    if let Some(data) = response.get("data") {
        let code = data.get("payment_status_code").and_then(parse_i64);
        let status_ok = matches!(
            data.get("payment_status")
                .and_then(Value::as_str)
                .map(str::to_ascii_lowercase)
                .as_deref(),
            Some("success") | Some("completed")
        );

        if code == Some(0) || status_ok {
            return Some(ProviderOutcome::Completed);
        }
        if code.is_some() {
            return Some(ProviderOutcome::Failed);
        }
    }

    None
}

/// Providers send status codes as numbers or numeric strings.
fn parse_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str()?.parse().ok())
}

/// One calendar month later, day clamped to the target month's length
/// (Jan 31 -> Feb 28/29).
pub fn add_one_month(at: OffsetDateTime) -> OffsetDateTime {
    let date = at.date();
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        m => (date.year(), m.next()),
    };
    let day = date.day().min(time::util::days_in_year_month(year, month));
    let new_date =
        Date::from_calendar_date(year, month, day).expect("clamped day is always valid");
    at.replace_date(new_date)
}

/// The user's current plan, derived from their most recent completed
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStatus {
    pub plan: PlanTier,
    pub is_active: bool,
    pub is_expired: bool,
}

/// Derive the current plan from the most recent completed transaction.
///
/// A past expiry with auto-renew still on keeps the stored plan label but
/// flags it provisionally expired: the renewal charge has not landed yet.
pub fn plan_status_from(latest: Option<&transactions::Model>, now: OffsetDateTime) -> PlanStatus {
    let Some(txn) = latest else {
        return PlanStatus {
            plan: PlanTier::Free,
            is_active: false,
            is_expired: false,
        };
    };

    let stored_plan = txn.plan.unwrap_or(PlanTier::Free);

    match txn.expires_at {
        // Legacy record without an expiry: treat as active
        None => PlanStatus {
            plan: stored_plan,
            is_active: true,
            is_expired: false,
        },
        Some(expires_at) if expires_at > now => PlanStatus {
            plan: stored_plan,
            is_active: true,
            is_expired: false,
        },
        Some(_) if txn.auto_renew == Some(true) => PlanStatus {
            plan: stored_plan,
            is_active: false,
            is_expired: true,
        },
        Some(_) => PlanStatus {
            plan: PlanTier::Free,
            is_active: false,
            is_expired: true,
        },
    }
}

/// Infer a missing plan label from the charged amount and the payer's role.
pub fn infer_plan(role: UserRole, amount: Decimal) -> Option<PlanTier> {
    let price = |n: u32| Decimal::from(n);
    match role {
        UserRole::Student if amount == price(5) => Some(PlanTier::Basic),
        UserRole::Student if amount == price(10) => Some(PlanTier::Premium),
        UserRole::Company if amount == price(25) => Some(PlanTier::Basic),
        UserRole::Company if amount == price(50) => Some(PlanTier::Premium),
        _ => None,
    }
}

/// Price table, the inverse of `infer_plan`.
pub fn plan_price(role: UserRole, plan: PlanTier) -> Option<Decimal> {
    match (role, plan) {
        (UserRole::Student, PlanTier::Basic) => Some(Decimal::from(5)),
        (UserRole::Student, PlanTier::Premium) => Some(Decimal::from(10)),
        (UserRole::Company, PlanTier::Basic) => Some(Decimal::from(25)),
        (UserRole::Company, PlanTier::Premium) => Some(Decimal::from(50)),
        _ => None,
    }
}

pub struct SubscriptionService {
    db: DatabaseConnection,
    gateway: Arc<PaymentGateway>,
}

impl SubscriptionService {
    pub fn new(db: DatabaseConnection, gateway: Arc<PaymentGateway>) -> Self {
        Self { db, gateway }
    }

    /// Create a pending transaction and the signed gateway form for it.
    #[instrument(skip(self, user))]
    pub async fn initiate_checkout(
        &self,
        user: &entity::users::Model,
        plan: PlanTier,
    ) -> Result<(transactions::Model, String, HashMap<String, String>)> {
        let amount = plan_price(user.role, plan).ok_or_else(|| {
            ApiError::Validation(format!(
                "Plan {} is not purchasable for role {}",
                plan.as_str(),
                user.role.as_str()
            ))
        })?;

        let now = OffsetDateTime::now_utc();
        let tran_id = format!("wl-{}", Uuid::new_v4());

        let pending = transactions::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.id),
            provider_tran_id: Set(tran_id.clone()),
            amount: Set(amount),
            currency: Set("USD".to_string()),
            plan: Set(Some(plan)),
            status: Set(TransactionStatus::Pending),
            transaction_date: Set(None),
            expires_at: Set(None),
            next_billing_date: Set(None),
            auto_renew: Set(None),
            provider_metadata: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let txn = pending.insert(&self.db).await?;

        let (firstname, lastname) = split_name(user.full_name.as_deref());
        let form = self.gateway.checkout_fields(
            &tran_id,
            &format!("{:.2}", amount),
            "USD",
            &firstname,
            &lastname,
            &user.email,
        )?;

        info!(tran_id, plan = plan.as_str(), "Checkout initiated");

        Ok((txn, self.gateway.purchase_endpoint(), form))
    }

    /// Poll the provider and reconcile the local record in one step.
    pub async fn check_and_reconcile(
        &self,
        tran_id: &str,
        requester_id: Uuid,
        requester_role: UserRole,
    ) -> Result<transactions::Model> {
        let response = self.gateway.check_transaction(tran_id).await?;
        self.reconcile(&response, tran_id, requester_id, requester_role)
            .await
    }

    /// Apply the provider's report to the internal transaction record.
    ///
    /// All-or-nothing: ownership and lifecycle checks run before any field is
    /// written, and a replayed completed response is a no-op (expires_at is
    /// never moved after the first successful transition).
    #[instrument(skip(self, response))]
    pub async fn reconcile(
        &self,
        response: &Value,
        tran_id: &str,
        requester_id: Uuid,
        requester_role: UserRole,
    ) -> Result<transactions::Model> {
        let txn = self.find_owned(tran_id, requester_id, requester_role).await?;

        let Some(outcome) = interpret_provider_status(response) else {
            // No interpretable status: do not guess, do not mutate
            info!(tran_id, "Provider response carried no interpretable status");
            return Ok(txn);
        };

        // Lifecycle invariant: only pending transactions advance. Terminal
        // states are never reopened here (refunds are applied externally).
        if txn.status.is_terminal() {
            return Ok(txn);
        }

        let now = OffsetDateTime::now_utc();
        let mut active: transactions::ActiveModel = txn.clone().into();

        match outcome {
            ProviderOutcome::Completed => {
                let transaction_date = txn.transaction_date.unwrap_or(now);
                active.status = Set(TransactionStatus::Completed);
                active.transaction_date = Set(Some(transaction_date));
                if txn.expires_at.is_none() {
                    let expires_at = add_one_month(transaction_date);
                    active.expires_at = Set(Some(expires_at));
                    active.next_billing_date = Set(Some(expires_at));
                }
                active.auto_renew = Set(Some(txn.auto_renew.unwrap_or(true)));
            }
            ProviderOutcome::Failed => {
                active.status = Set(TransactionStatus::Failed);
            }
        }

        active.provider_metadata = Set(Some(response.clone()));
        active.updated_at = Set(now);

        let updated = active.update(&self.db).await?;

        info!(
            tran_id,
            status = ?updated.status,
            "Transaction reconciled"
        );

        Ok(updated)
    }

    /// Stop renewal at period end; the subscription runs out naturally.
    #[instrument(skip(self))]
    pub async fn cancel_auto_renew(
        &self,
        tran_id: &str,
        requester_id: Uuid,
        requester_role: UserRole,
    ) -> Result<transactions::Model> {
        let txn = self.find_owned(tran_id, requester_id, requester_role).await?;
        self.disable_renewal(txn, false).await
    }

    /// Immediate downgrade: renewal off and the expiry backdated to now.
    #[instrument(skip(self))]
    pub async fn downgrade_to_free(
        &self,
        tran_id: &str,
        requester_id: Uuid,
        requester_role: UserRole,
    ) -> Result<transactions::Model> {
        let txn = self.find_owned(tran_id, requester_id, requester_role).await?;
        self.disable_renewal(txn, true).await
    }

    async fn disable_renewal(
        &self,
        txn: transactions::Model,
        backdate_expiry: bool,
    ) -> Result<transactions::Model> {
        if txn.status != TransactionStatus::Completed {
            return Err(ApiError::Validation(
                "Only a completed transaction can be cancelled or downgraded".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let mut active: transactions::ActiveModel = txn.into();
        active.auto_renew = Set(Some(false));
        active.next_billing_date = Set(None);
        if backdate_expiry {
            active.expires_at = Set(Some(now));
        }
        active.updated_at = Set(now);

        Ok(active.update(&self.db).await?)
    }

    /// Resolve the user's current plan from their most recent completed
    /// transaction.
    pub async fn resolve_current_plan(&self, user_id: Uuid) -> Result<PlanStatus> {
        let latest = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::Status.eq(TransactionStatus::Completed))
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::CreatedAt)
            .one(&self.db)
            .await?;

        Ok(plan_status_from(latest.as_ref(), OffsetDateTime::now_utc()))
    }

    /// Backfill a missing plan label from (amount, payer role). Admin repair
    /// tool for records created before the plan column existed.
    #[instrument(skip(self))]
    pub async fn fix_plan(&self, tran_id: &str) -> Result<transactions::Model> {
        let txn = transactions::Entity::find()
            .filter(transactions::Column::ProviderTranId.eq(tran_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", tran_id)))?;

        if txn.plan.is_some() {
            return Ok(txn);
        }

        let owner = entity::users::Entity::find_by_id(txn.user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Transaction owner not found".to_string()))?;

        let plan = infer_plan(owner.role, txn.amount).ok_or_else(|| {
            ApiError::Validation(format!(
                "No plan matches amount {} for role {}",
                txn.amount,
                owner.role.as_str()
            ))
        })?;

        let mut active: transactions::ActiveModel = txn.into();
        active.plan = Set(Some(plan));
        active.updated_at = Set(OffsetDateTime::now_utc());

        Ok(active.update(&self.db).await?)
    }

    /// Load a transaction, enforcing ownership. Admins may act on any record.
    async fn find_owned(
        &self,
        tran_id: &str,
        requester_id: Uuid,
        requester_role: UserRole,
    ) -> Result<transactions::Model> {
        let txn = transactions::Entity::find()
            .filter(transactions::Column::ProviderTranId.eq(tran_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Transaction {} not found", tran_id)))?;

        if txn.user_id != requester_id && requester_role != UserRole::Admin {
            return Err(ApiError::Forbidden(
                "Transaction belongs to another user".to_string(),
            ));
        }

        Ok(txn)
    }
}

fn split_name(full_name: Option<&str>) -> (String, String) {
    match full_name {
        Some(name) => match name.split_once(' ') {
            Some((first, last)) => (first.to_string(), last.to_string()),
            None => (name.to_string(), String::new()),
        },
        None => (String::new(), String::new()),
    }
}
