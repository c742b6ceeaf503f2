// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire models on both sides of the bridge.
//!
//! [`RawLogRecord`] is the activity log entry as exported by the source tenant, one element of an
//! envelope's `records` list. [`NormalizedAuditEvent`] is the audit event schema accepted by the
//! ingestion channel, and [`AuditEvent`] is the submission entry wrapping its serialized form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder written wherever the source record has no value for a required field.
pub const NONE_PLACEHOLDER: &str = "None";

/// Administrative activity log entry as delivered inside an envelope.
///
/// Every field is optional and kept as raw JSON: a value of an unexpected type never fails
/// decoding, the transformer decides which values are fatal.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogRecord {
    pub correlation_id: Option<Value>,
    #[serde(rename = "ReleaseVersion")]
    pub release_version: Option<Value>,
    pub identity: Option<Value>,
    pub resource_id: Option<Value>,
    pub operation_name: Option<Value>,
    pub time: Option<Value>,
    pub caller_ip_address: Option<Value>,
    pub tenant_id: Option<Value>,
    pub properties: Option<Value>,
}

impl RawLogRecord {
    /// `correlationId` as written into event ids, `"None"` when absent
    pub fn correlation_label(&self) -> String {
        match &self.correlation_id {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => NONE_PLACEHOLDER.to_string(),
        }
    }

    /// `properties.eventCategory`, when present and a string
    pub fn event_category(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|properties| properties.get("eventCategory"))
            .and_then(Value::as_str)
    }

    /// Value of `identity.claims.<claim>`, if any
    pub fn claim(&self, claim: &str) -> Option<&Value> {
        self.identity
            .as_ref()
            .and_then(|identity| identity.get("claims"))
            .and_then(|claims| claims.get(claim))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
    #[serde(rename = "principalId")]
    pub principal_id: Value,
    pub details: Value,
}

/// Audit event in the ingestion channel's schema.
///
/// Serialized field order follows the struct, which keeps `eventData` payloads stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAuditEvent {
    pub version: Value,
    pub user_identity: UserIdentity,
    pub user_agent: String,
    pub event_source: Value,
    pub event_name: Value,
    /// Always `YYYY-MM-DDTHH:MM:SSZ`
    pub event_time: String,
    #[serde(rename = "UID")]
    pub uid: String,
    pub request_parameters: Value,
    pub response_elements: Value,
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: Value,
    pub recipient_account_id: String,
    pub additional_event_data: Value,
}

/// One entry of a submission batch: the opaque serialized event plus its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_data: String,
    pub id: String,
}
