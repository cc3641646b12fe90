use crate::error::{ApiError, Result};
use entity::sea_orm_active_enums::{PlanTier, UserRole};
use serde::Serialize;

/// Standard success envelope: `{success, data?, message?}`.
/// Errors take the `{success:false, error:{code,message}}` shape (see error.rs).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn data_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Chargeable features tracked by the usage-limit counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    ResumeFeedback,
    InterviewQuestions,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResumeFeedback => "resume_feedback",
            Self::InterviewQuestions => "interview_questions",
        }
    }
}

/// Parse an untrusted role string. Never cast query/body strings into the
/// enum directly.
pub fn parse_role(s: &str) -> Result<UserRole> {
    match s.to_lowercase().as_str() {
        "student" => Ok(UserRole::Student),
        "company" => Ok(UserRole::Company),
        "admin" => Ok(UserRole::Admin),
        other => Err(ApiError::Validation(format!("Unknown role: {}", other))),
    }
}

/// Parse an untrusted plan string.
pub fn parse_plan(s: &str) -> Result<PlanTier> {
    match s.to_lowercase().as_str() {
        "free" => Ok(PlanTier::Free),
        "basic" => Ok(PlanTier::Basic),
        "premium" => Ok(PlanTier::Premium),
        other => Err(ApiError::Validation(format!("Unknown plan: {}", other))),
    }
}

/// Parse an untrusted feature key.
pub fn parse_feature(s: &str) -> Result<Feature> {
    match s {
        "resume_feedback" => Ok(Feature::ResumeFeedback),
        "interview_questions" => Ok(Feature::InterviewQuestions),
        other => Err(ApiError::Validation(format!("Unknown feature: {}", other))),
    }
}
