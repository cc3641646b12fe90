pub mod applications;
pub mod jobs;
pub mod sea_orm_active_enums;
pub mod transactions;
pub mod usage_counters;
pub mod users;
