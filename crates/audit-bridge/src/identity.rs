// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resolution of the account that receives the audit events.
//!
//! Resolved once at cold start, either from `RECIPIENT_ACCOUNT_ID` or with a single
//! `GetCallerIdentity` call against the identity endpoint.

use crate::config::Config;
use crate::error::BridgeError;
use crate::signing::{RequestSigner, IDENTITY_SERVICE};
use chrono::Utc;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentityEnvelope {
    get_caller_identity_response: CallerIdentityResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentityResponse {
    get_caller_identity_result: CallerIdentity,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

/// Returns the configured account id, or asks the identity endpoint who we are.
pub async fn resolve_account_id(
    config: &Config,
    client: &reqwest::Client,
) -> Result<String, BridgeError> {
    if let Some(account_id) = &config.recipient_account_id {
        debug!("Using configured recipient account {account_id}");
        return Ok(account_id.clone());
    }

    let signer = config.credentials.as_ref().map(|credentials| {
        RequestSigner::new(credentials.clone(), &config.region, IDENTITY_SERVICE)
    });
    let account_id = get_caller_account(client, &config.identity_url, signer.as_ref()).await?;
    debug!("Resolved recipient account {account_id}");
    Ok(account_id)
}

async fn get_caller_account(
    client: &reqwest::Client,
    url: &str,
    signer: Option<&RequestSigner>,
) -> Result<String, BridgeError> {
    let mut request = client
        .get(format!("{url}/"))
        .query(&[("Action", "GetCallerIdentity"), ("Version", "2011-06-15")])
        .header(ACCEPT, "application/json")
        .build()
        .map_err(|e| BridgeError::Identity(e.to_string()))?;
    if let Some(signer) = signer {
        signer
            .sign(&mut request, Utc::now())
            .map_err(|e| BridgeError::Identity(e.to_string()))?;
    }

    let resp = client
        .execute(request)
        .await
        .map_err(|e| {
            error!("Failed to call identity endpoint: {e:?}");
            BridgeError::Identity(e.to_string())
        })?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!("{status}: identity endpoint rejected the request: {body}");
        return Err(BridgeError::Identity(format!(
            "unexpected status {status}"
        )));
    }

    let identity: CallerIdentityEnvelope = resp.json().await.map_err(|e| {
        error!("Failed to decode caller identity: {e:?}");
        BridgeError::Identity(e.to_string())
    })?;

    Ok(identity
        .get_caller_identity_response
        .get_caller_identity_result
        .account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use crate::signing::Credentials;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn client() -> reqwest::Client {
        build_client(None, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_configured_account_skips_lookup() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", "/").expect(0).create_async().await;

        let config = Config {
            identity_url: server.url(),
            recipient_account_id: Some("111122223333".to_string()),
            ..Default::default()
        };

        let account = resolve_account_id(&config, &client()).await.unwrap();
        assert_eq!(account, "111122223333");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resolves_account_from_identity_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "GetCallerIdentity".into()),
                Matcher::UrlEncoded("Version".into(), "2011-06-15".into()),
            ]))
            .match_header("accept", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"GetCallerIdentityResponse":{"GetCallerIdentityResult":{"Account":"123456789012","Arn":"arn:aws:sts::123456789012:assumed-role/bridge/fn","UserId":"AROA:fn"},"ResponseMetadata":{"RequestId":"r-1"}}}"#,
            )
            .create_async()
            .await;

        let config = Config {
            identity_url: server.url(),
            ..Default::default()
        };

        let account = resolve_account_id(&config, &client()).await.unwrap();
        assert_eq!(account, "123456789012");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_identity_request_is_signed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .match_header(
                "authorization",
                Matcher::Regex(
                    r"^AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/\d{8}/us-east-1/sts/aws4_request, SignedHeaders=host;x-amz-date, Signature=[0-9a-f]{64}$"
                        .to_string(),
                ),
            )
            .match_header("x-amz-security-token", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"GetCallerIdentityResponse":{"GetCallerIdentityResult":{"Account":"444455556666"}}}"#)
            .expect(1)
            .create_async()
            .await;

        let config = Config {
            identity_url: server.url(),
            credentials: Some(Credentials {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: None,
            }),
            ..Default::default()
        };

        let account = resolve_account_id(&config, &client()).await.unwrap();
        assert_eq!(account, "444455556666");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_identity_endpoint_rejection() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("AccessDenied")
            .create_async()
            .await;

        let config = Config {
            identity_url: server.url(),
            ..Default::default()
        };

        let result = resolve_account_id(&config, &client()).await;
        assert!(matches!(result, Err(BridgeError::Identity(_))));
    }

    #[tokio::test]
    async fn test_identity_endpoint_bad_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create_async()
            .await;

        let config = Config {
            identity_url: server.url(),
            ..Default::default()
        };

        let result = resolve_account_id(&config, &client()).await;
        assert!(matches!(result, Err(BridgeError::Identity(_))));
    }
}
