//! Job-request classifier — asks the LLM whether an email is a job request.
//!
//! Flow:
//! 1. Build the prompt from subject, sender and body
//! 2. Single completion call, bounded by a timeout
//! 3. Extract JSON (fenced code block or raw text) and parse the verdict
//!
//! Any failure collapses into [`ClassificationVerdict::fail_safe`], which the
//! gate always filters.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::{debug, info, warn};

use crate::error::ClassifyError;
use crate::llm::provider::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};
use crate::pipeline::types::{CanonicalEmail, ClassificationVerdict, ExtractedData};

/// Output cap for the classification call.
const CLASSIFY_MAX_TOKENS: u32 = 1024;

/// Temperature for classification (deterministic-ish).
const CLASSIFY_TEMPERATURE: f32 = 0.1;

/// Body characters included in the prompt.
const BODY_PREVIEW_CHARS: usize = 4000;

/// Classifies canonical emails through an LLM provider.
pub struct JobClassifier {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl JobClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Classify an email. Always returns a fully populated verdict.
    pub async fn classify(&self, email: &CanonicalEmail) -> ClassificationVerdict {
        let verdict = match self.try_classify(email).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(
                    error = %e,
                    from = %email.from,
                    "Classification failed, using fail-safe verdict"
                );
                ClassificationVerdict::fail_safe()
            }
        };

        let extracted = verdict.extracted();
        info!(
            is_job_request = verdict.is_job_request,
            confidence = verdict.confidence,
            location = extracted.location.as_deref().unwrap_or("-"),
            date = extracted.date.as_deref().unwrap_or("-"),
            time = extracted.time.as_deref().unwrap_or("-"),
            job_type = extracted.job_type.as_deref().unwrap_or("-"),
            techs_needed = extracted.techs_needed.as_deref().unwrap_or("-"),
            reasoning = %verdict.reasoning,
            "Classification verdict"
        );

        verdict
    }

    async fn try_classify(
        &self,
        email: &CanonicalEmail,
    ) -> Result<ClassificationVerdict, ClassifyError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(email)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.llm.complete(request))
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout))??;

        debug!(
            model = self.llm.model_name(),
            response_id = response.response_id.as_deref().unwrap_or("-"),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Classification reply received"
        );
        if response.finish_reason == FinishReason::Length {
            warn!(
                max_tokens = CLASSIFY_MAX_TOKENS,
                "Classification reply truncated at the token limit"
            );
        }

        parse_verdict(&response.content)
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_system_prompt() -> &'static str {
    "You classify inbound emails for a field-service scheduling team. \
     Decide whether an email is a request to book or schedule a job. \
     Favor precision over recall: only report high confidence when the email \
     clearly asks for work to be done. Newsletters, receipts, marketing, \
     replies without a new request and vague inquiries are not job requests. \
     Respond with JSON only."
}

fn build_user_prompt(email: &CanonicalEmail) -> String {
    let body: String = email.body_plain.chars().take(BODY_PREVIEW_CHARS).collect();

    let mut prompt = String::with_capacity(body.len() + 1024);
    prompt.push_str("Analyze this email and determine whether it is a job request.\n\n");
    prompt.push_str(&format!("Subject: {}\n", email.subject));
    prompt.push_str(&format!("From: {}\n", email.from));
    prompt.push_str(&format!("Body:\n{}\n\n", body));
    prompt.push_str(
        "Return a JSON object with exactly these fields:\n\
         {\n\
         \x20 \"isJobRequest\": true or false,\n\
         \x20 \"confidence\": number from 0 to 100,\n\
         \x20 \"extractedData\": {\n\
         \x20   \"location\": string or null,\n\
         \x20   \"date\": string or null,\n\
         \x20   \"time\": string or null,\n\
         \x20   \"jobType\": string or null,\n\
         \x20   \"techsNeeded\": string or null\n\
         \x20 },\n\
         \x20 \"reasoning\": short explanation\n\
         }",
    );
    prompt
}

// ── Response parsing ────────────────────────────────────────────────

/// Verdict as the LLM returns it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictResponse {
    is_job_request: bool,
    #[serde(deserialize_with = "number_or_numeric_string")]
    confidence: f64,
    #[serde(default)]
    extracted_data: Option<ExtractedData>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Accept `85`, `85.5` or `"85"`. Anything else, or a non-finite value, is an error.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| D::Error::custom("confidence must be a number"))
}

/// Parse the LLM reply into a verdict.
fn parse_verdict(raw: &str) -> Result<ClassificationVerdict, ClassifyError> {
    let json_str = extract_json(raw);
    let response: VerdictResponse = serde_json::from_str(json_str)
        .map_err(|e| ClassifyError::Parse(format!("JSON parse error: {e}")))?;

    Ok(ClassificationVerdict {
        is_job_request: response.is_job_request,
        confidence: response.confidence.clamp(0.0, 100.0),
        extracted_data: response.extracted_data,
        reasoning: response.reasoning.unwrap_or_default(),
    })
}

/// Inner content of the first fenced code block, else the whole text. Trimmed.
fn extract_json(text: &str) -> &str {
    if let Some(start) = text.find("```json") {
        let after = &text[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }

    text.trim()
}
