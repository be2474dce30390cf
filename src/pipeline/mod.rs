//! Inbound email intake pipeline.
//!
//! Every webhook delivery flows through:
//! 1. `FieldNormalizer::normalize()` — provider keys → canonical email
//! 2. `JobClassifier::classify()` — LLM job-request verdict (fail-safe on error)
//! 3. Gate — job request with confidence strictly above the threshold
//! 4. `ForwardingClient::forward()` — single POST to the downstream intake service
//!
//! Nothing is shared between deliveries and nothing is persisted.

pub mod classifier;
pub mod forwarder;
pub mod normalizer;
pub mod processor;
pub mod types;

pub use classifier::JobClassifier;
pub use forwarder::ForwardingClient;
pub use normalizer::{Field, FieldNormalizer, normalize};
pub use processor::{IntakePipeline, spawn_intake};
pub use types::{
    CanonicalEmail, ClassificationVerdict, Decision, ExtractedData, ForwardOutcome, GateAction,
    RawPayload,
};
