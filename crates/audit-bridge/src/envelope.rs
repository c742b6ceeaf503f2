// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unpacking of queue deliveries into raw log records.
//!
//! One invocation carries a batch of queue messages (envelopes). Each envelope body is a JSON
//! document with a `records` list. Envelopes that cannot be unpacked are skipped individually and
//! the records of the remaining envelopes are concatenated in delivery order. Records stay raw
//! JSON here; decoding them is the transformer's job.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

/// Invocation payload pushed by the queue: `{"Records": [...]}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationPayload {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueMessage>,
}

/// One queue message. Only the body is consumed, the id is kept for logging.
///
/// Both are raw JSON so that one odd message cannot fail the whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueMessage {
    #[serde(rename = "messageId")]
    pub message_id: Option<Value>,
    pub body: Option<Value>,
}

impl QueueMessage {
    fn id(&self) -> &str {
        self.message_id
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    records: Option<Vec<Value>>,
}

/// Why a single envelope was skipped
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("message has no text body")]
    MissingBody,

    #[error("body is not a valid envelope: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("envelope has no records list")]
    MissingRecords,
}

/// Extracts the records carried by one envelope
pub fn unpack_envelope(message: &QueueMessage) -> Result<Vec<Value>, EnvelopeError> {
    let Some(Value::String(body)) = &message.body else {
        return Err(EnvelopeError::MissingBody);
    };
    let envelope: EnvelopeBody =
        serde_json::from_str(body).map_err(EnvelopeError::InvalidBody)?;
    envelope.records.ok_or(EnvelopeError::MissingRecords)
}

/// Collects the records of every envelope that unpacks cleanly, preserving relative order.
///
/// Envelopes that fail are logged and skipped; they never abort the rest of the batch.
pub fn collect_records(payload: &InvocationPayload) -> Vec<Value> {
    let mut collected = Vec::new();

    for message in &payload.records {
        let message_id = message.id();
        match unpack_envelope(message) {
            Ok(records) => {
                debug!(
                    message_id,
                    count = records.len(),
                    "Unpacked records from envelope"
                );
                collected.extend(records);
            }
            Err(e) => {
                error!(
                    message_id,
                    "Skipping envelope because of inconsistent data: {e}"
                );
            }
        }
    }

    collected
}
