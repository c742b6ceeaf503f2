// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::BridgeError;
use crate::signing::Credentials;
use std::env;
use std::time::Duration;
use tracing::warn;

pub const ENV_CHANNEL_ARN: &str = "CLOUDTRAIL_LAKE_CHANNEL_ARN";
pub const ENV_DEFAULT_USER_TYPE: &str = "DEFAULT_USER_TYPE";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_INGEST_URL: &str = "AUDIT_INGEST_URL";
pub const ENV_IDENTITY_URL: &str = "AUDIT_IDENTITY_URL";
pub const ENV_RECIPIENT_ACCOUNT_ID: &str = "RECIPIENT_ACCOUNT_ID";
pub const ENV_HTTPS_PROXY: &str = "HTTPS_PROXY";
pub const ENV_INGEST_TIMEOUT_SECS: &str = "AUDIT_INGEST_TIMEOUT_SECS";

pub const DEFAULT_USER_TYPE: &str = "MSAzureUser";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Process-wide configuration, read once from the environment at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion channel the audit events are written to
    pub channel_arn: String,
    /// User identity type stamped on every event
    pub default_user_type: String,
    /// Log level (e.g., trace, debug, info, warn, error), already normalized
    pub log_level: String,
    pub region: String,
    /// Ingestion API prefix, without the operation path
    pub ingest_url: String,
    /// Identity API prefix used to look up the recipient account
    pub identity_url: String,
    /// Skips the identity lookup when set
    pub recipient_account_id: Option<String>,
    pub https_proxy: Option<String>,
    /// Signs outbound calls when present; requests go out unsigned otherwise
    pub credentials: Option<Credentials>,
    /// Timeout for each outbound request
    pub request_timeout: Duration,
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, BridgeError> {
        let channel_arn =
            env::var(ENV_CHANNEL_ARN).map_err(|_| BridgeError::MissingConfig(ENV_CHANNEL_ARN))?;
        let default_user_type =
            env::var(ENV_DEFAULT_USER_TYPE).unwrap_or_else(|_| DEFAULT_USER_TYPE.to_string());
        let log_level = match env::var(ENV_LOG_LEVEL) {
            Ok(val) => match normalize_log_level(&val) {
                Some(level) => level.to_string(),
                None => {
                    warn!("Unknown log level '{val}', falling back to {DEFAULT_LOG_LEVEL}");
                    DEFAULT_LOG_LEVEL.to_string()
                }
            },
            Err(_) => DEFAULT_LOG_LEVEL.to_string(),
        };
        let region = env::var(ENV_REGION).unwrap_or_else(|_| DEFAULT_REGION.to_string());

        // AUDIT_INGEST_URL / AUDIT_IDENTITY_URL are primarily used for integration tests and
        // signing sidecars, they override the whole endpoint prefix
        let ingest_url = env::var(ENV_INGEST_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| ingest_url(&region));
        let identity_url = env::var(ENV_IDENTITY_URL)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| identity_url(&region));

        let recipient_account_id = env::var(ENV_RECIPIENT_ACCOUNT_ID)
            .ok()
            .filter(|id| !id.trim().is_empty());
        let https_proxy = env::var(ENV_HTTPS_PROXY).ok();
        let credentials = Credentials::from_env();

        let request_timeout = match env::var(ENV_INGEST_TIMEOUT_SECS) {
            Ok(val) => val.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                BridgeError::InvalidConfig(format!(
                    "{ENV_INGEST_TIMEOUT_SECS} must be a number of seconds, got '{val}'"
                ))
            })?,
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let config = Self {
            channel_arn,
            default_user_type,
            log_level,
            region,
            ingest_url,
            identity_url,
            recipient_account_id,
            https_proxy,
            credentials,
            request_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.channel_arn.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "{ENV_CHANNEL_ARN} cannot be empty"
            )));
        }

        if self.default_user_type.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "{ENV_DEFAULT_USER_TYPE} cannot be empty"
            )));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(BridgeError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(BridgeError::InvalidConfig(format!(
                "{ENV_INGEST_TIMEOUT_SECS} must be greater than 0"
            )));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_arn: String::new(),
            default_user_type: DEFAULT_USER_TYPE.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            region: DEFAULT_REGION.to_string(),
            ingest_url: ingest_url(DEFAULT_REGION),
            identity_url: identity_url(DEFAULT_REGION),
            recipient_account_id: None,
            https_proxy: None,
            credentials: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Maps a `LOG_LEVEL` value onto a tracing level.
///
/// Also accepts the `WARNING`, `CRITICAL` and `FATAL` spellings, case-insensitively.
pub fn normalize_log_level(level: &str) -> Option<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" | "critical" | "fatal" => Some("error"),
        _ => None,
    }
}

fn ingest_url(region: &str) -> String {
    format!("https://cloudtrail-data.{region}.amazonaws.com")
}

fn identity_url(region: &str) -> String {
    format!("https://sts.{region}.amazonaws.com")
}
