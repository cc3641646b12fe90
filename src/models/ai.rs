use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResumeFeedbackRequest {
    #[validate(length(min = 1, max = 50000, message = "resumeText is required"))]
    pub resume_text: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InterviewQuestionsRequest {
    #[validate(length(min = 1, max = 200))]
    pub job_title: String,
    #[validate(length(max = 20000))]
    pub job_description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTextData {
    pub content: String,
    pub usage_remaining: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    pub feature: String,
    pub allowed: bool,
    pub current: i32,
    /// None when the caller's plan is unbounded for this feature.
    pub limit: Option<i32>,
}
