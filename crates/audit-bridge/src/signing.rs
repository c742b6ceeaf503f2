// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! AWS Signature Version 4 signing for the identity and ingestion calls.
//!
//! Credentials come from the variables the function runtime exports for the execution role.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::env;
use std::fmt;

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Signing name of the audit ingestion API
pub const INGEST_SERVICE: &str = "cloudtrail-data";
/// Signing name of the identity API
pub const IDENTITY_SERVICE: &str = "sts";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SCOPE_DATE_FORMAT: &str = "%Y%m%d";
const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("invalid signing key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),

    #[error("signature does not fit in a header: {0}")]
    Header(#[from] InvalidHeaderValue),
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Credentials {
    /// Reads the execution role credentials, `None` unless both key parts are set
    pub fn from_env() -> Option<Self> {
        let non_empty = |var: &str| env::var(var).ok().filter(|val| !val.trim().is_empty());
        Some(Credentials {
            access_key_id: non_empty(ENV_ACCESS_KEY_ID)?,
            secret_access_key: non_empty(ENV_SECRET_ACCESS_KEY)?,
            session_token: non_empty(ENV_SESSION_TOKEN),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Signs requests for one service in one region
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
    service: &'static str,
}

struct CanonicalRequest {
    request: String,
    signed_headers: String,
}

impl RequestSigner {
    #[must_use]
    pub fn new(credentials: Credentials, region: &str, service: &'static str) -> Self {
        RequestSigner {
            credentials,
            region: region.to_string(),
            service,
        }
    }

    /// Adds `x-amz-date`, the session token when there is one, and `Authorization`.
    ///
    /// Must run on the fully built request: the url and body are part of the signature.
    pub fn sign(
        &self,
        request: &mut reqwest::Request,
        now: DateTime<Utc>,
    ) -> Result<(), SigningError> {
        let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
        let scope = format!(
            "{}/{}/{}/aws4_request",
            now.format(SCOPE_DATE_FORMAT),
            self.region,
            self.service
        );

        let payload = request
            .body()
            .and_then(reqwest::Body::as_bytes)
            .unwrap_or_default();
        let canonical = canonical_request(
            request.method().as_str(),
            request.url(),
            &amz_date,
            self.credentials.session_token.as_deref(),
            payload,
        );

        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical.request.as_bytes()))
        );
        let signature = hex::encode(hmac(
            &self.signing_key(&now.format(SCOPE_DATE_FORMAT).to_string())?,
            string_to_sign.as_bytes(),
        )?);
        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            self.credentials.access_key_id, canonical.signed_headers
        );

        let headers = request.headers_mut();
        headers.insert(X_AMZ_DATE, HeaderValue::from_str(&amz_date)?);
        if let Some(token) = &self.credentials.session_token {
            headers.insert(X_AMZ_SECURITY_TOKEN, HeaderValue::from_str(token.trim())?);
        }
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);
        Ok(())
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, SigningError> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let key = hmac(secret.as_bytes(), date.as_bytes())?;
        let key = hmac(&key, self.region.as_bytes())?;
        let key = hmac(&key, self.service.as_bytes())?;
        hmac(&key, b"aws4_request")
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_request(
    method: &str,
    url: &Url,
    amz_date: &str,
    session_token: Option<&str>,
    payload: &[u8],
) -> CanonicalRequest {
    // Sorted by name
    let mut headers = vec![("host", host_header(url)), (X_AMZ_DATE, amz_date.to_string())];
    if let Some(token) = session_token {
        headers.push((X_AMZ_SECURITY_TOKEN, token.trim().to_string()));
    }

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let request = format!(
        "{method}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
        canonical_uri(url.path()),
        canonical_query(url),
        hex::encode(Sha256::digest(payload))
    );

    CanonicalRequest {
        request,
        signed_headers,
    }
}

// Matches the Host header reqwest sends: the port only when it is not the scheme default
fn host_header(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (uri_encode(&key), uri_encode(&value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(char::from(byte))
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
