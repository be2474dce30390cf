//! Shared types for the intake pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Inbound webhook payload, shaped entirely by the email provider.
pub type RawPayload = serde_json::Map<String, serde_json::Value>;

// ── Canonical email ─────────────────────────────────────────────────

/// Provider-independent view of an inbound email.
///
/// Every field is always present; missing data is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEmail {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub body_plain: String,
}

impl CanonicalEmail {
    /// True when there is nothing to classify (subject, sender and body all empty).
    pub fn has_no_signal(&self) -> bool {
        self.subject.is_empty() && self.from.is_empty() && self.body_plain.is_empty()
    }

    /// Redacted view for the decision log. The body is reduced to its length.
    pub fn summary(&self) -> EmailSummary {
        EmailSummary {
            from: self.from.clone(),
            subject: self.subject.clone(),
            body_length: self.body_plain.chars().count(),
        }
    }
}

/// Redacted email fields carried by a [`Decision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSummary {
    pub from: String,
    pub subject: String,
    pub body_length: usize,
}

// ── Classification verdict ──────────────────────────────────────────

/// Reasoning attached to the fail-safe verdict.
pub const FAIL_SAFE_REASONING: &str =
    "AI analysis failed, defaulting to filter for safety (confidence below threshold)";

/// Confidence attached to the fail-safe verdict. Kept at or below the gate.
pub const FAIL_SAFE_CONFIDENCE: f64 = 50.0;

/// Job details the oracle may pull out of the email.
///
/// All five keys are always serialized; missing values go out as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedData {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub techs_needed: Option<String>,
}

/// Accept `"2"`, `2` or `null`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `None` serializes as `{}`.
fn extracted_or_empty<S>(data: &Option<ExtractedData>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match data {
        Some(data) => data.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// Outcome of the job-request classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationVerdict {
    pub is_job_request: bool,
    /// 0–100 inclusive.
    pub confidence: f64,
    /// `None` when the oracle sent no extraction, and on the fail-safe path.
    #[serde(serialize_with = "extracted_or_empty")]
    pub extracted_data: Option<ExtractedData>,
    pub reasoning: String,
}

impl ClassificationVerdict {
    /// The verdict used whenever classification cannot complete.
    ///
    /// Its confidence sits below the gate, so the email is filtered.
    pub fn fail_safe() -> Self {
        Self {
            is_job_request: true,
            confidence: FAIL_SAFE_CONFIDENCE,
            extracted_data: None,
            reasoning: FAIL_SAFE_REASONING.to_string(),
        }
    }

    /// Extracted details, empty when there are none.
    pub fn extracted(&self) -> ExtractedData {
        self.extracted_data.clone().unwrap_or_default()
    }

    /// Gating decision: job request AND confidence strictly above the threshold.
    pub fn should_forward(&self, threshold: f64) -> bool {
        self.is_job_request && self.confidence > threshold
    }
}

// ── Forwarding ──────────────────────────────────────────────────────

/// Result of the single forwarding attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ── Decision ────────────────────────────────────────────────────────

/// Gating action taken for an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateAction {
    Forwarded,
    Filtered,
}

impl GateAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forwarded => "FORWARDED",
            Self::Filtered => "FILTERED",
        }
    }
}

/// Audit record written to the log at the end of every pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub email: EmailSummary,
    pub ai_analysis: ClassificationVerdict,
    pub action: GateAction,
    /// True only when forwarding was attempted and succeeded.
    pub forwarded_to_core: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_result: Option<ForwardOutcome>,
}

impl Decision {
    pub fn new(
        email: &CanonicalEmail,
        verdict: ClassificationVerdict,
        forward_result: Option<ForwardOutcome>,
    ) -> Self {
        let action = if forward_result.is_some() {
            GateAction::Forwarded
        } else {
            GateAction::Filtered
        };
        Self {
            timestamp: Utc::now(),
            email: email.summary(),
            ai_analysis: verdict,
            action,
            forwarded_to_core: forward_result.as_ref().is_some_and(|o| o.success),
            forward_result,
        }
    }
}
