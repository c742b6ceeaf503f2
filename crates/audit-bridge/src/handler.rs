// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-invocation pipeline: unpack, transform, submit.

use crate::config::Config;
use crate::envelope::{collect_records, InvocationPayload};
use crate::error::BridgeError;
use crate::ingest::{ingest_data, IngestionClient, IngestionResult};
use crate::transform::{transform_records, TransformConfig};
use serde_json::{json, Value};
use tracing::{debug, error, info};

/// How an invocation ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// Nothing could be unpacked from the delivery
    NoRecords,
    /// Records were unpacked but none of them were Administrative
    NoEvents,
    /// The batch was submitted; the result carries per-entry outcomes
    Ingested(IngestionResult),
    /// The submission call itself failed. Logged, not retried.
    IngestionFailed,
}

impl InvocationOutcome {
    /// Body returned to the runtime for this invocation
    pub fn response_body(&self) -> Value {
        match self {
            InvocationOutcome::Ingested(result) => json!({
                "result": result.result,
                "failed": result.failed,
                "successful": result.successful,
            }),
            _ => Value::Null,
        }
    }
}

/// Immutable per-process state shared by every invocation
#[derive(Debug)]
pub struct Bridge<C> {
    channel: String,
    transform_config: TransformConfig,
    client: C,
}

impl<C: IngestionClient> Bridge<C> {
    pub fn new(channel: String, transform_config: TransformConfig, client: C) -> Self {
        Bridge {
            channel,
            transform_config,
            client,
        }
    }

    pub fn from_config(config: &Config, recipient_account_id: String, client: C) -> Self {
        Self::new(
            config.channel_arn.clone(),
            TransformConfig::new(config, recipient_account_id),
            client,
        )
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn transform_config(&self) -> &TransformConfig {
        &self.transform_config
    }

    /// Runs one invocation to completion.
    ///
    /// Only a record that cannot be transformed fails the invocation; every other problem is
    /// logged and reported through the returned [`InvocationOutcome`].
    pub async fn handle(&self, payload: Value) -> Result<InvocationOutcome, BridgeError> {
        let payload: InvocationPayload = match serde_json::from_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                info!("No audit events were found to ingest from the queue message ({e}). Quitting.");
                return Ok(InvocationOutcome::NoRecords);
            }
        };

        let records = collect_records(&payload);
        if records.is_empty() {
            info!("No audit events were found to ingest, because there are no items on the list. Quitting.");
            return Ok(InvocationOutcome::NoRecords);
        }
        debug!(
            "Collected {} log entries from {} envelopes",
            records.len(),
            payload.records.len()
        );

        let events = transform_records(&records, &self.transform_config)?;
        if events.is_empty() {
            info!("Every log entry was skipped, nothing to ingest. Quitting.");
            return Ok(InvocationOutcome::NoEvents);
        }

        match ingest_data(&self.client, &self.channel, &events).await {
            Ok(result) => {
                info!(
                    success = result.result,
                    failed = result.failed.len(),
                    successful = result.successful.len(),
                    "Ingested audit events"
                );
                Ok(InvocationOutcome::Ingested(result))
            }
            Err(e) => {
                error!("Failed to ingest data: {e}");
                Ok(InvocationOutcome::IngestionFailed)
            }
        }
    }
}
