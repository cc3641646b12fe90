use entity::sea_orm_active_enums::ApplicationStatus;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub is_open: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub is_open: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<entity::jobs::Model> for JobData {
    fn from(job: entity::jobs::Model) -> Self {
        Self {
            id: job.id,
            company_id: job.company_id,
            title: job.title,
            description: job.description,
            location: job.location,
            employment_type: job.employment_type,
            is_open: job.is_open,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    #[validate(url(message = "resumeUrl must be a valid URL"))]
    pub resume_url: String,
    pub cover_letter: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateApplicationRequest {
    /// "reviewed" | "accepted" | "rejected"
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationData {
    pub id: Uuid,
    pub job_id: Uuid,
    pub student_id: Uuid,
    pub resume_url: String,
    pub cover_letter: Option<String>,
    pub status: ApplicationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<entity::applications::Model> for ApplicationData {
    fn from(a: entity::applications::Model) -> Self {
        Self {
            id: a.id,
            job_id: a.job_id,
            student_id: a.student_id,
            resume_url: a.resume_url,
            cover_letter: a.cover_letter,
            status: a.status,
            created_at: a.created_at,
        }
    }
}

/// Public directory listing entry for companies/students.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub user_id: Uuid,
    pub full_name: Option<String>,
}
