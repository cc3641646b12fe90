use crate::{
    config::QuotaConfig,
    error::{ApiError, Result},
    models::common::Feature,
};
use entity::sea_orm_active_enums::{PlanTier, UserRole};
use entity::usage_counters;
use sea_orm::{
    entity::*,
    query::*,
    sea_query::{Expr, OnConflict},
    DatabaseConnection, DatabaseTransaction,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UsageStatus {
    pub allowed: bool,
    pub current: i32,
    /// None = unbounded (top-tier plans and admins)
    pub limit: Option<i32>,
    pub message: Option<String>,
}

pub struct QuotaService {
    db: DatabaseConnection,
    config: QuotaConfig,
}

impl QuotaService {
    pub fn new(db: DatabaseConnection, config: &QuotaConfig) -> Self {
        Self {
            db,
            config: config.clone(),
        }
    }

    /// Monthly invocation limit for (feature, role, plan). None = unbounded.
    fn limit_for(&self, feature: Feature, role: UserRole, plan: PlanTier) -> Option<i32> {
        if role == UserRole::Admin {
            return None;
        }
        match (plan, feature) {
            (PlanTier::Free, Feature::ResumeFeedback) => {
                Some(self.config.free_resume_feedback_monthly)
            }
            (PlanTier::Free, Feature::InterviewQuestions) => {
                Some(self.config.free_interview_questions_monthly)
            }
            (PlanTier::Basic, Feature::ResumeFeedback) => {
                Some(self.config.basic_resume_feedback_monthly)
            }
            (PlanTier::Basic, Feature::InterviewQuestions) => {
                Some(self.config.basic_interview_questions_monthly)
            }
            (PlanTier::Premium, _) => None,
        }
    }

    /// Read-only quota check. Paired with `increment_usage` this is a
    /// check-then-act without synchronization: two concurrent requests can
    /// both pass before either increments, over-running the quota by up to
    /// concurrency - 1. Chargeable handlers use `check_and_increment`, which
    /// closes that race with a row lock.
    #[instrument(skip(self))]
    pub async fn check_usage_limit(
        &self,
        user_id: Uuid,
        feature: Feature,
        role: UserRole,
        plan: PlanTier,
    ) -> Result<UsageStatus> {
        let limit = self.limit_for(feature, role, plan);
        let current = self.current_count(user_id, feature).await?;

        Ok(status_from(current, limit, feature))
    }

    /// Unconditional single-statement increment for the current period.
    #[instrument(skip(self))]
    pub async fn increment_usage(&self, user_id: Uuid, feature: Feature) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let period = current_period(now);

        let new_counter = usage_counters::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            feature_key: Set(feature.as_str().to_string()),
            period: Set(period),
            count: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        };

        usage_counters::Entity::insert(new_counter)
            .on_conflict(
                OnConflict::columns([
                    usage_counters::Column::UserId,
                    usage_counters::Column::FeatureKey,
                    usage_counters::Column::Period,
                ])
                .value(
                    usage_counters::Column::Count,
                    Expr::col((usage_counters::Entity, usage_counters::Column::Count)).add(1),
                )
                .value(usage_counters::Column::UpdatedAt, now)
                .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// Atomic check + increment inside one transaction with a row lock.
    /// Closes the check-then-act race for chargeable features.
    #[instrument(skip(self))]
    pub async fn check_and_increment(
        &self,
        user_id: Uuid,
        feature: Feature,
        role: UserRole,
        plan: PlanTier,
    ) -> Result<UsageStatus> {
        let limit = self.limit_for(feature, role, plan);

        let txn = self.db.begin().await?;

        let counter = self.find_and_lock_counter(user_id, feature, &txn).await?;

        if let Some(limit) = limit {
            if counter.count >= limit {
                txn.rollback().await?;
                return Err(ApiError::QuotaExceeded(format!(
                    "Monthly limit reached for {}: {}/{}",
                    feature.as_str(),
                    counter.count,
                    limit
                )));
            }
        }

        let new_count = counter.count + 1;
        let mut active: usage_counters::ActiveModel = counter.into();
        active.count = Set(new_count);
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(&txn).await?;

        txn.commit().await?;

        info!(
            user_id = %user_id,
            feature = feature.as_str(),
            count = new_count,
            "Usage recorded"
        );

        Ok(status_from(new_count, limit, feature))
    }

    async fn current_count(&self, user_id: Uuid, feature: Feature) -> Result<i32> {
        let period = current_period(OffsetDateTime::now_utc());

        let counter = usage_counters::Entity::find()
            .filter(usage_counters::Column::UserId.eq(user_id))
            .filter(usage_counters::Column::FeatureKey.eq(feature.as_str()))
            .filter(usage_counters::Column::Period.eq(period))
            .one(&self.db)
            .await?;

        Ok(counter.map(|c| c.count).unwrap_or(0))
    }

    /// Find and lock the current-period counter, creating it first if absent
    /// (ON CONFLICT DO NOTHING guards the create against concurrent inserts).
    async fn find_and_lock_counter(
        &self,
        user_id: Uuid,
        feature: Feature,
        txn: &DatabaseTransaction,
    ) -> Result<usage_counters::Model> {
        let now = OffsetDateTime::now_utc();
        let period = current_period(now);

        let counter = usage_counters::Entity::find()
            .filter(usage_counters::Column::UserId.eq(user_id))
            .filter(usage_counters::Column::FeatureKey.eq(feature.as_str()))
            .filter(usage_counters::Column::Period.eq(period))
            .lock_exclusive()
            .one(txn)
            .await?;

        if let Some(counter) = counter {
            return Ok(counter);
        }

        let new_counter = usage_counters::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            feature_key: Set(feature.as_str().to_string()),
            period: Set(period),
            count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        usage_counters::Entity::insert(new_counter)
            .on_conflict(
                OnConflict::columns([
                    usage_counters::Column::UserId,
                    usage_counters::Column::FeatureKey,
                    usage_counters::Column::Period,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec(txn)
            .await?;

        usage_counters::Entity::find()
            .filter(usage_counters::Column::UserId.eq(user_id))
            .filter(usage_counters::Column::FeatureKey.eq(feature.as_str()))
            .filter(usage_counters::Column::Period.eq(period))
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| {
                ApiError::Internal(anyhow::anyhow!(
                    "Failed to create or lock usage counter record"
                ))
            })
    }
}

/// Billing period key: the first day of the current UTC month.
fn current_period(now: OffsetDateTime) -> time::Date {
    now.date()
        .replace_day(1)
        .expect("day 1 exists in every month")
}

fn status_from(current: i32, limit: Option<i32>, feature: Feature) -> UsageStatus {
    let allowed = limit.map(|l| current < l).unwrap_or(true);
    let message = (!allowed).then(|| {
        format!(
            "Monthly limit reached for {}: {}/{}",
            feature.as_str(),
            current,
            limit.unwrap_or(0)
        )
    });

    UsageStatus {
        allowed,
        current,
        limit,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn test_config() -> QuotaConfig {
        QuotaConfig {
            free_resume_feedback_monthly: 3,
            free_interview_questions_monthly: 3,
            basic_resume_feedback_monthly: 20,
            basic_interview_questions_monthly: 20,
        }
    }

    #[test]
    fn test_current_period_is_first_of_month() {
        let now = datetime!(2026-08-23 14:00:00 UTC);
        assert_eq!(current_period(now), time::macros::date!(2026-08-01));
    }

    #[test]
    fn test_limit_lookup() {
        let service = QuotaService {
            db: DatabaseConnection::Disconnected,
            config: test_config(),
        };

        assert_eq!(
            service.limit_for(Feature::ResumeFeedback, UserRole::Student, PlanTier::Free),
            Some(3)
        );
        assert_eq!(
            service.limit_for(Feature::ResumeFeedback, UserRole::Student, PlanTier::Basic),
            Some(20)
        );
        // Premium and admins are unbounded
        assert_eq!(
            service.limit_for(
                Feature::InterviewQuestions,
                UserRole::Student,
                PlanTier::Premium
            ),
            None
        );
        assert_eq!(
            service.limit_for(Feature::ResumeFeedback, UserRole::Admin, PlanTier::Free),
            None
        );
    }

    #[test]
    fn test_status_from_boundary() {
        let at_limit = status_from(3, Some(3), Feature::ResumeFeedback);
        assert!(!at_limit.allowed);
        assert!(at_limit.message.is_some());

        let below = status_from(2, Some(3), Feature::ResumeFeedback);
        assert!(below.allowed);
        assert!(below.message.is_none());

        let unbounded = status_from(1_000_000, None, Feature::ResumeFeedback);
        assert!(unbounded.allowed);
    }
}
