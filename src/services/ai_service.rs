use crate::{
    config::AiConfig,
    error::{ApiError, Result},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

pub struct AiService {
    config: AiConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl AiService {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            config: config.clone(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Structured feedback on a resume: strengths, gaps, concrete rewrites.
    #[instrument(skip(self, resume_text))]
    pub async fn resume_feedback(&self, resume_text: &str) -> Result<String> {
        let system = "You are a career coach reviewing resumes for students and \
                      early-career candidates. Give specific, actionable feedback: \
                      strengths, gaps, and concrete rewrites of weak bullet points.";
        self.chat(system, resume_text).await
    }

    /// Likely interview questions (with suggested answer angles) for a role.
    #[instrument(skip(self, job_description))]
    pub async fn interview_questions(
        &self,
        job_title: &str,
        job_description: Option<&str>,
    ) -> Result<String> {
        let system = "You prepare candidates for interviews. Produce the ten most \
                      likely interview questions for the given role, each with a \
                      short note on what a strong answer covers.";
        let prompt = match job_description {
            Some(desc) => format!("Role: {}\n\nJob description:\n{}", job_title, desc),
            None => format!("Role: {}", job_title),
        };
        self.chat(system, &prompt).await
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("LLM request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "LLM provider returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("LLM response malformed: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ApiError::Upstream("LLM response contained no choices".to_string()))
    }
}
