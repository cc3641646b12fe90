// Request/response models
pub mod ai;
pub mod auth;
pub mod common;
pub mod jobs;
pub mod payments;
