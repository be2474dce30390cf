//! Forwarding client — posts classified emails to the downstream intake endpoint.
//!
//! Single attempt, no retries. Failures are captured in the returned
//! [`ForwardOutcome`] instead of being raised.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::error::ForwardError;
use crate::pipeline::types::{CanonicalEmail, ClassificationVerdict, ForwardOutcome};

/// Body sent downstream.
#[derive(Debug, Serialize)]
struct ForwardPayload<'a> {
    subject: &'a str,
    from: &'a str,
    to: &'a str,
    #[serde(rename = "body-plain")]
    body_plain: &'a str,
    #[serde(rename = "aiAnalysis")]
    ai_analysis: &'a ClassificationVerdict,
}

/// HTTP client for the downstream intake endpoint.
pub struct ForwardingClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl ForwardingClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ForwardError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    /// Forward an email and its verdict. Never fails outward.
    pub async fn forward(
        &self,
        email: &CanonicalEmail,
        verdict: &ClassificationVerdict,
    ) -> ForwardOutcome {
        match self.send(email, verdict).await {
            Ok((status, body)) => {
                info!(url = %self.url, status, "Forwarded email downstream");
                ForwardOutcome {
                    success: true,
                    status_code: Some(status),
                    response_body: Some(body),
                    error_message: None,
                }
            }
            Err(e) => {
                let (status_code, response_body) = match &e {
                    ForwardError::Status { status, body } => (Some(*status), Some(body.clone())),
                    _ => (None, None),
                };
                error!(
                    url = %self.url,
                    status = status_code,
                    error = %e,
                    "Forwarding failed"
                );
                ForwardOutcome {
                    success: false,
                    status_code,
                    response_body,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    async fn send(
        &self,
        email: &CanonicalEmail,
        verdict: &ClassificationVerdict,
    ) -> Result<(u16, serde_json::Value), ForwardError> {
        let payload = ForwardPayload {
            subject: &email.subject,
            from: &email.from,
            to: &email.to,
            body_plain: &email.body_plain,
            ai_analysis: verdict,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.map_transport(e))?;
        let body = body_value(text);

        if (200..300).contains(&status) {
            Ok((status, body))
        } else {
            Err(ForwardError::Status { status, body })
        }
    }

    fn map_transport(&self, e: reqwest::Error) -> ForwardError {
        if e.is_timeout() {
            ForwardError::Timeout(self.timeout)
        } else {
            ForwardError::Http(e)
        }
    }
}

/// JSON body when it parses, otherwise the raw text.
fn body_value(text: String) -> serde_json::Value {
    if text.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
}
