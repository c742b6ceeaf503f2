// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Submission of audit event batches to the ingestion channel.
//!
//! A batch goes out in a single `PutAuditEvents` call. The endpoint reports per-entry outcomes;
//! those lists are passed through untouched, only the overall flag is derived here.

use crate::config::Config;
use crate::event::AuditEvent;
use crate::signing::{RequestSigner, SigningError, INGEST_SERVICE};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unable to sign request: {0}")]
    Signing(#[from] SigningError),

    #[error("{status}: ingestion endpoint rejected the batch: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unable to decode ingestion response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Per-entry outcome lists as returned by the endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutAuditEventsOutput {
    #[serde(default)]
    pub failed: Vec<Value>,
    #[serde(default)]
    pub successful: Vec<Value>,
}

/// Result of one submission; `result` is true iff nothing failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub result: bool,
    pub failed: Vec<Value>,
    pub successful: Vec<Value>,
}

impl From<PutAuditEventsOutput> for IngestionResult {
    fn from(output: PutAuditEventsOutput) -> Self {
        IngestionResult {
            result: output.failed.is_empty(),
            failed: output.failed,
            successful: output.successful,
        }
    }
}

#[async_trait]
pub trait IngestionClient {
    /// Sends the whole batch to `channel` in one call
    async fn put_audit_events(
        &self,
        channel: &str,
        events: &[AuditEvent],
    ) -> Result<PutAuditEventsOutput, IngestionError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutAuditEventsRequest<'a> {
    audit_events: &'a [AuditEvent],
}

/// HTTP client for the audit ingestion API
#[derive(Debug, Clone)]
pub struct AuditIngestApi {
    client: reqwest::Client,
    endpoint: String,
    signer: Option<RequestSigner>,
}

impl AuditIngestApi {
    /// Unsigned client, for endpoints fronted by a signing proxy
    #[must_use]
    pub fn new(client: reqwest::Client, ingest_url: &str) -> Self {
        AuditIngestApi {
            client,
            endpoint: format!("{}/PutAuditEvents", ingest_url.trim_end_matches('/')),
            signer: None,
        }
    }

    #[must_use]
    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Signs with the configured credentials when there are any
    #[must_use]
    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        let api = Self::new(client, &config.ingest_url);
        match &config.credentials {
            Some(credentials) => api.with_signer(RequestSigner::new(
                credentials.clone(),
                &config.region,
                INGEST_SERVICE,
            )),
            None => api,
        }
    }
}

#[async_trait]
impl IngestionClient for AuditIngestApi {
    async fn put_audit_events(
        &self,
        channel: &str,
        events: &[AuditEvent],
    ) -> Result<PutAuditEventsOutput, IngestionError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .query(&[("channelArn", channel)])
            .json(&PutAuditEventsRequest {
                audit_events: events,
            })
            .build()
            .map_err(IngestionError::Transport)?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut request, Utc::now())?;
        }

        let resp = self
            .client
            .execute(request)
            .await
            .map_err(IngestionError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IngestionError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            });
        }

        resp.json::<PutAuditEventsOutput>()
            .await
            .map_err(IngestionError::Decode)
    }
}

/// Submits the batch once. Errors are logged in full and returned to the caller, never retried.
pub async fn ingest_data<C>(
    client: &C,
    channel: &str,
    events: &[AuditEvent],
) -> Result<IngestionResult, IngestionError>
where
    C: IngestionClient + ?Sized,
{
    debug!("Putting {} audit events to {channel}", events.len());

    match client.put_audit_events(channel, events).await {
        Ok(output) => {
            let result = IngestionResult::from(output);
            if result.result {
                debug!("Successfully put {} audit events", result.successful.len());
            } else {
                error!(
                    "{} of {} audit events were rejected: {:?}",
                    result.failed.len(),
                    events.len(),
                    result.failed
                );
            }
            Ok(result)
        }
        Err(e) => {
            error!("Failed to put events: {e:?}");
            Err(e)
        }
    }
}
