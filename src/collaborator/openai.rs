//! OpenAI chat completions backend (`api-direct` feature)

use super::FieldExtractor;
use crate::error::{WorkflowError, WorkflowResult};
use serde_json::{json, Value as JsonValue};
use std::time::Duration;

pub const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Environment variable holding the API key
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Document characters sent with each request
const MAX_TEXT_CHARS: usize = 8000;
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f64 = 0.1;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const EXTRACTION_PROMPT: &str = r#"You extract structured information from grant documents (proposals, award letters, application materials).

Return a JSON object with these keys, where every leaf is {"value": ..., "confidence": "high" | "medium" | "low" | "uncertain"}:
- grant_id, grant_name, funding_agency, award_amount (number only), grant_type (Research/Education/Infrastructure/Training/Equipment/Other)
- timeline: application_date, award_date, project_start_date, project_end_date (YYYY-MM-DD), duration_months
- principal_investigator: {name, role, institution, email}
- co_investigators: list of {name, role, institution, email}
- project: abstract, objectives (list)
- budget: personnel, equipment, travel, supplies, indirect_costs, other, total

Confidence: high 90-100%, medium 70-89%, low 50-69%, uncertain below 50%.
Return only valid JSON. Use null for values that are not in the document."#;

/// Calls the chat completions API with the extraction prompt
pub struct OpenAiExtractor {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> WorkflowResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| WorkflowError::FieldExtraction(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            url: API_URL.to_string(),
        })
    }

    /// Build from `OPENAI_API_KEY`. `None` when the key is unset or blank.
    pub fn from_env(model: &str) -> WorkflowResult<Option<Self>> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim(), model).map(Some),
            _ => Ok(None),
        }
    }

    /// Point at a compatible endpoint instead of the public API
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

fn request_body(model: &str, text: &str) -> JsonValue {
    let excerpt: String = text.chars().take(MAX_TEXT_CHARS).collect();
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": EXTRACTION_PROMPT},
            {"role": "user", "content": format!("Document text to analyze:\n\n{}", excerpt)}
        ],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS
    })
}

/// First choice's message content. Markdown code fences around the JSON are
/// removed.
fn message_content(response: &JsonValue) -> WorkflowResult<String> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| {
            WorkflowError::FieldExtraction("response has no message content".to_string())
        })?;

    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(unfenced.trim().to_string())
}

impl FieldExtractor for OpenAiExtractor {
    fn extract_fields(&self, text: &str) -> WorkflowResult<String> {
        tracing::info!(model = %self.model, chars = text.len(), "requesting field extraction");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, text))
            .send()
            .map_err(|e| WorkflowError::FieldExtraction(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(WorkflowError::FieldExtraction(format!(
                "API returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body: JsonValue = response
            .json()
            .map_err(|e| WorkflowError::FieldExtraction(e.to_string()))?;
        message_content(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
