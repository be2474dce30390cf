//! Field normalizer — maps provider-specific payload keys onto a [`CanonicalEmail`].
//!
//! Each canonical field owns an ordered list of candidate keys. The first
//! candidate holding a usable value wins; no match yields an empty string.
//! Pure string handling, no I/O.

use serde_json::Value;

use crate::pipeline::types::{CanonicalEmail, RawPayload};

/// Canonical field a candidate list resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Subject,
    From,
    To,
    BodyPlain,
}

/// Candidate-key strategy for building canonical emails.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    subject: Vec<String>,
    from: Vec<String>,
    to: Vec<String>,
    body_plain: Vec<String>,
}

impl FieldNormalizer {
    /// Replace the candidate list for one field.
    pub fn with_candidates<I, S>(mut self, field: Field, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.candidates_mut(field) = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Candidate keys for a field, in precedence order.
    pub fn candidates(&self, field: Field) -> &[String] {
        match field {
            Field::Subject => &self.subject,
            Field::From => &self.from,
            Field::To => &self.to,
            Field::BodyPlain => &self.body_plain,
        }
    }

    fn candidates_mut(&mut self, field: Field) -> &mut Vec<String> {
        match field {
            Field::Subject => &mut self.subject,
            Field::From => &mut self.from,
            Field::To => &mut self.to,
            Field::BodyPlain => &mut self.body_plain,
        }
    }

    /// Build a canonical email from any payload. Never fails.
    pub fn normalize(&self, raw: &RawPayload) -> CanonicalEmail {
        CanonicalEmail {
            subject: self.resolve(raw, Field::Subject),
            from: self.resolve(raw, Field::From),
            to: self.resolve(raw, Field::To),
            body_plain: self.resolve(raw, Field::BodyPlain),
        }
    }

    fn resolve(&self, raw: &RawPayload, field: Field) -> String {
        self.candidates(field)
            .iter()
            .filter_map(|key| raw.get(key))
            .find_map(render)
            .unwrap_or_default()
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        fn keys(list: &[&str]) -> Vec<String> {
            list.iter().map(|k| k.to_string()).collect()
        }

        Self {
            subject: keys(&["subject", "Subject"]),
            from: keys(&["sender", "from", "From", "sender_email", "email"]),
            to: keys(&["recipient", "to", "To", "recipient_email", "delivered_to"]),
            body_plain: keys(&[
                "body-plain",
                "stripped-text",
                "text",
                "body",
                "content",
                "message",
            ]),
        }
    }
}

/// Text form of a payload value, or `None` when it carries nothing usable.
fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        _ => None,
    }
}

/// Normalize with the default candidate lists.
pub fn normalize(raw: &RawPayload) -> CanonicalEmail {
    FieldNormalizer::default().normalize(raw)
}
