//! Intake pipeline — runs every webhook delivery after the response is sent.
//!
//! Flow:
//! 1. Normalize the raw payload
//! 2. Abort when subject, sender and body are all empty
//! 3. LLM classification (fail-safe on any error)
//! 4. Gate: job request AND confidence > threshold
//! 5. Forward downstream when the gate passes
//! 6. Log the decision

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::ForwardError;
use crate::llm::provider::LlmProvider;
use crate::pipeline::classifier::JobClassifier;
use crate::pipeline::forwarder::ForwardingClient;
use crate::pipeline::normalizer::FieldNormalizer;
use crate::pipeline::types::{Decision, RawPayload};

/// Normalize → classify → gate → forward, once per delivery.
pub struct IntakePipeline {
    normalizer: FieldNormalizer,
    classifier: JobClassifier,
    forwarder: ForwardingClient,
    threshold: f64,
}

impl IntakePipeline {
    pub fn new(
        normalizer: FieldNormalizer,
        classifier: JobClassifier,
        forwarder: ForwardingClient,
        threshold: f64,
    ) -> Self {
        Self {
            normalizer,
            classifier,
            forwarder,
            threshold,
        }
    }

    /// Wire up the pipeline from configuration.
    pub fn from_config(
        config: &RelayConfig,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self, ForwardError> {
        Ok(Self::new(
            FieldNormalizer::default(),
            JobClassifier::new(llm, config.classify_timeout),
            ForwardingClient::new(config.downstream_url.clone(), config.forward_timeout)?,
            config.confidence_threshold,
        ))
    }

    /// Process one delivery. Returns `None` when the payload carried no signal.
    pub async fn handle(&self, raw: RawPayload) -> Option<Decision> {
        let email = self.normalizer.normalize(&raw);

        if email.has_no_signal() {
            warn!(
                keys = raw.len(),
                "No subject, sender or body in payload, skipping"
            );
            return None;
        }

        debug!(from = %email.from, subject = %email.subject, "Email normalized");

        let verdict = self.classifier.classify(&email).await;

        let forward_result = if verdict.should_forward(self.threshold) {
            Some(self.forwarder.forward(&email, &verdict).await)
        } else {
            debug!(
                is_job_request = verdict.is_job_request,
                confidence = verdict.confidence,
                threshold = self.threshold,
                "Gate closed, not forwarding"
            );
            None
        };

        let decision = Decision::new(&email, verdict, forward_result);
        match serde_json::to_string(&decision) {
            Ok(json) => info!(
                action = decision.action.label(),
                forwarded_to_core = decision.forwarded_to_core,
                decision = %json,
                "Intake decision"
            ),
            Err(e) => error!(error = %e, "Failed to serialize intake decision"),
        }

        Some(decision)
    }
}

/// Run the pipeline for one delivery as a detached task.
///
/// The caller does not await the result. A watcher task logs panics; the
/// returned handle belongs to the watcher and may be dropped.
pub fn spawn_intake(
    pipeline: Arc<IntakePipeline>,
    raw: RawPayload,
    delivery_id: Uuid,
) -> JoinHandle<()> {
    let span = info_span!("intake", %delivery_id);
    let task = tokio::spawn(async move { pipeline.handle(raw).await }.instrument(span));

    tokio::spawn(async move {
        match task.await {
            Ok(Some(decision)) => {
                debug!(%delivery_id, action = decision.action.label(), "Intake task finished");
            }
            Ok(None) => debug!(%delivery_id, "Intake task skipped empty payload"),
            Err(e) => error!(%delivery_id, error = %e, "Intake task failed"),
        }
    })
}
