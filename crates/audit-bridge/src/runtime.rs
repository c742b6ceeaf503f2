// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client for the function runtime API that delivers queue batches to this process.

use crate::error::BridgeError;
use crate::handler::Bridge;
use crate::ingest::IngestionClient;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;
use tracing::{debug, error};

pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
const RUNTIME_API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
/// Pause after a failed exchange with the runtime API before polling again
pub const RUNTIME_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// One delivery handed out by the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub request_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct RuntimeClient {
    // Long-polling `next` must not be cut short by the outbound request timeout
    client: reqwest::Client,
    base_url: String,
}

impl RuntimeClient {
    #[must_use]
    pub fn new(client: reqwest::Client, runtime_api: &str) -> Self {
        let runtime_api = runtime_api.trim_end_matches('/');
        let base_url = if runtime_api.starts_with("http://") || runtime_api.starts_with("https://")
        {
            format!("{runtime_api}/{RUNTIME_API_VERSION}/runtime")
        } else {
            format!("http://{runtime_api}/{RUNTIME_API_VERSION}/runtime")
        };
        RuntimeClient { client, base_url }
    }

    /// Reads the runtime API address from the environment
    pub fn from_env() -> Result<Self, BridgeError> {
        let runtime_api =
            env::var(ENV_RUNTIME_API).map_err(|_| BridgeError::MissingConfig(ENV_RUNTIME_API))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::Http(e.to_string()))?;
        Ok(Self::new(client, &runtime_api))
    }

    /// Blocks until the runtime hands out the next invocation
    pub async fn next_invocation(&self) -> Result<Invocation, BridgeError> {
        let resp = self
            .client
            .get(format!("{}/invocation/next", self.base_url))
            .send()
            .await
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BridgeError::Runtime(format!(
                "{}: failed to fetch next invocation",
                resp.status()
            )));
        }

        let request_id = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|id| id.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                BridgeError::Runtime(format!("invocation is missing {REQUEST_ID_HEADER}"))
            })?;

        let payload = resp
            .json::<Value>()
            .await
            .map_err(|e| BridgeError::Runtime(format!("invalid invocation payload: {e}")))?;

        Ok(Invocation {
            request_id,
            payload,
        })
    }

    pub async fn send_response(&self, request_id: &str, body: &Value) -> Result<(), BridgeError> {
        self.post(&format!("invocation/{request_id}/response"), body)
            .await
    }

    pub async fn send_error(&self, request_id: &str, err: &BridgeError) -> Result<(), BridgeError> {
        let body = json!({
            "errorMessage": err.to_string(),
            "errorType": err.error_type(),
        });
        self.post(&format!("invocation/{request_id}/error"), &body)
            .await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(), BridgeError> {
        let resp = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(BridgeError::Runtime(format!(
                "{}: runtime API rejected {path}",
                resp.status()
            )))
        }
    }

    /// Fetches, handles and answers exactly one invocation
    pub async fn handle_next<C>(&self, bridge: &Bridge<C>) -> Result<(), BridgeError>
    where
        C: IngestionClient + Send + Sync,
    {
        let invocation = self.next_invocation().await?;
        debug!(request_id = %invocation.request_id, "Received invocation");

        match bridge.handle(invocation.payload).await {
            Ok(outcome) => {
                self.send_response(&invocation.request_id, &outcome.response_body())
                    .await
            }
            Err(e) => {
                error!(request_id = %invocation.request_id, "Invocation failed: {e}");
                self.send_error(&invocation.request_id, &e).await
            }
        }
    }

    /// Serves invocations one at a time until the process is stopped
    pub async fn run<C>(&self, bridge: &Bridge<C>)
    where
        C: IngestionClient + Send + Sync,
    {
        loop {
            if let Err(e) = self.handle_next(bridge).await {
                error!("Runtime API error: {e}");
                tokio::time::sleep(RUNTIME_ERROR_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditEvent;
    use crate::ingest::{IngestionError, PutAuditEventsOutput};
    use crate::transform::TransformConfig;
    use async_trait::async_trait;
    use mockito::{Matcher, Server};

    struct AcceptAll;

    #[async_trait]
    impl IngestionClient for AcceptAll {
        async fn put_audit_events(
            &self,
            _channel: &str,
            events: &[AuditEvent],
        ) -> Result<PutAuditEventsOutput, IngestionError> {
            Ok(PutAuditEventsOutput {
                failed: vec![],
                successful: events.iter().map(|e| json!({"id": e.id})).collect(),
            })
        }
    }

    fn bridge() -> Bridge<AcceptAll> {
        Bridge::new(
            "channel".to_string(),
            TransformConfig {
                default_user_type: "MSAzureUser".to_string(),
                recipient_account_id: "123456789012".to_string(),
            },
            AcceptAll,
        )
    }

    fn runtime(server: &Server) -> RuntimeClient {
        RuntimeClient::new(reqwest::Client::new(), &server.url())
    }

    #[test]
    fn test_base_url_without_scheme() {
        let client = RuntimeClient::new(reqwest::Client::new(), "127.0.0.1:9001");
        assert_eq!(client.base_url, "http://127.0.0.1:9001/2018-06-01/runtime");
    }

    #[tokio::test]
    async fn test_next_invocation() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/2018-06-01/runtime/invocation/next")
            .with_status(200)
            .with_header(REQUEST_ID_HEADER, "req-1")
            .with_body(r#"{"Records": []}"#)
            .create_async()
            .await;

        let invocation = runtime(&server).next_invocation().await.unwrap();
        assert_eq!(invocation.request_id, "req-1");
        assert_eq!(invocation.payload, json!({"Records": []}));
    }

    #[tokio::test]
    async fn test_next_invocation_without_request_id() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/2018-06-01/runtime/invocation/next")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let result = runtime(&server).next_invocation().await;
        assert!(matches!(result, Err(BridgeError::Runtime(_))));
    }

    #[tokio::test]
    async fn test_handle_next_posts_response() {
        let mut server = Server::new_async().await;
        let _next = server
            .mock("GET", "/2018-06-01/runtime/invocation/next")
            .with_status(200)
            .with_header(REQUEST_ID_HEADER, "req-2")
            .with_body(r#"{"Records": []}"#)
            .create_async()
            .await;
        let response = server
            .mock("POST", "/2018-06-01/runtime/invocation/req-2/response")
            .match_body(Matcher::Json(Value::Null))
            .with_status(202)
            .create_async()
            .await;

        runtime(&server).handle_next(&bridge()).await.unwrap();
        response.assert_async().await;
    }

    #[tokio::test]
    async fn test_handle_next_reports_transform_error() {
        let payload = json!({
            "Records": [{
                "messageId": "m-1",
                "body": json!({"records": [{
                    "correlationId": "c-1",
                    "time": "not a time",
                    "properties": {"eventCategory": "Administrative"}
                }]}).to_string()
            }]
        });

        let mut server = Server::new_async().await;
        let _next = server
            .mock("GET", "/2018-06-01/runtime/invocation/next")
            .with_status(200)
            .with_header(REQUEST_ID_HEADER, "req-3")
            .with_body(payload.to_string())
            .create_async()
            .await;
        let error = server
            .mock("POST", "/2018-06-01/runtime/invocation/req-3/error")
            .match_body(Matcher::PartialJson(json!({"errorType": "TransformError"})))
            .with_status(202)
            .create_async()
            .await;

        runtime(&server).handle_next(&bridge()).await.unwrap();
        error.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_backs_off_after_runtime_error() {
        let mut server = Server::new_async().await;
        let next = server
            .mock("GET", "/2018-06-01/runtime/invocation/next")
            .with_status(500)
            .expect_at_least(1)
            .expect_at_most(2)
            .create_async()
            .await;

        let runtime = runtime(&server);
        let bridge = bridge();
        let served = tokio::time::timeout(Duration::from_millis(300), runtime.run(&bridge)).await;

        assert!(served.is_err());
        next.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_response_rejected() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/2018-06-01/runtime/invocation/req-4/response")
            .with_status(413)
            .create_async()
            .await;

        let result = runtime(&server).send_response("req-4", &json!({})).await;
        assert!(matches!(result, Err(BridgeError::Runtime(_))));
    }
}
