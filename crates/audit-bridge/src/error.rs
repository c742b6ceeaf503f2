// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::ingest::IngestionError;
use crate::transform::TransformError;

/// Errors that can abort bridge startup or an invocation
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{0} environment variable is not set")]
    MissingConfig(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to resolve recipient account: {0}")]
    Identity(String),

    #[error("Failed to transform log entry: {0}")]
    Transform(#[from] TransformError),

    #[error("Failed to ingest audit events: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Runtime API error: {0}")]
    Runtime(String),

    #[error("Failed to build HTTP client: {0}")]
    Http(String),
}

impl BridgeError {
    /// Short name reported to the function runtime as `errorType`
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::MissingConfig(_) | BridgeError::InvalidConfig(_) => "ConfigError",
            BridgeError::Identity(_) => "IdentityError",
            BridgeError::Transform(_) => "TransformError",
            BridgeError::Ingestion(_) => "IngestionError",
            BridgeError::Runtime(_) => "RuntimeError",
            BridgeError::Http(_) => "HttpError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BridgeError::MissingConfig("CLOUDTRAIL_LAKE_CHANNEL_ARN");
        assert_eq!(
            error.to_string(),
            "CLOUDTRAIL_LAKE_CHANNEL_ARN environment variable is not set"
        );

        let error = BridgeError::InvalidConfig("empty channel".to_string());
        assert_eq!(error.to_string(), "Invalid configuration: empty channel");
    }

    #[test]
    fn test_transform_error_converts() {
        let error: BridgeError = TransformError::InvalidTimestamp {
            value: "yesterday".to_string(),
            reason: "input contains invalid characters".to_string(),
        }
        .into();
        assert_eq!(error.error_type(), "TransformError");
        assert!(error.to_string().contains("yesterday"));
    }

    #[test]
    fn test_error_types() {
        assert_eq!(
            BridgeError::Identity("denied".into()).error_type(),
            "IdentityError"
        );
        assert_eq!(
            BridgeError::Runtime("gone".into()).error_type(),
            "RuntimeError"
        );
        assert_eq!(BridgeError::Http("tls".into()).error_type(), "HttpError");
    }
}
