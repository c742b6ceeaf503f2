// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mapping of raw activity log records onto the audit event schema.

use crate::config::Config;
use crate::event::{AuditEvent, NormalizedAuditEvent, RawLogRecord, UserIdentity, NONE_PLACEHOLDER};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

/// Only records of this category are forwarded
pub const ADMINISTRATIVE_CATEGORY: &str = "Administrative";

/// Claim holding the caller's principal name
pub const PRINCIPAL_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/upn";

const EVENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// Tried in order after RFC 3339; naive timestamps are taken as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("log entry has no time")]
    MissingTimestamp,

    #[error("unable to parse time '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("log entry {index} is not an object: {source}")]
    MalformedRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("unable to serialize audit event: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Read-only settings applied to every record, fixed at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub default_user_type: String,
    /// Account the bridge runs in, not the source tenant
    pub recipient_account_id: String,
}

impl TransformConfig {
    pub fn new(config: &Config, recipient_account_id: String) -> Self {
        Self {
            default_user_type: config.default_user_type.clone(),
            recipient_account_id,
        }
    }
}

/// Reformats a source timestamp as `YYYY-MM-DDTHH:MM:SSZ` in UTC, dropping fractional seconds.
pub fn format_event_time(raw: &str) -> Result<String, TransformError> {
    let value = raw.trim();

    let parsed = match DateTime::parse_from_rfc3339(value) {
        Ok(datetime) => Ok(datetime.with_timezone(&Utc)),
        Err(rfc3339_err) => NAIVE_DATETIME_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(value, NAIVE_DATE_FORMAT)
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .map(|naive| naive.and_utc())
            .ok_or_else(|| TransformError::InvalidTimestamp {
                value: raw.to_string(),
                reason: rfc3339_err.to_string(),
            }),
    }?;

    Ok(parsed.format(EVENT_TIME_FORMAT).to_string())
}

/// Builds the audit event for one record, or `None` when the record is not Administrative.
pub fn normalize(
    record: &RawLogRecord,
    config: &TransformConfig,
) -> Result<Option<NormalizedAuditEvent>, TransformError> {
    let category = record.event_category();
    if category != Some(ADMINISTRATIVE_CATEGORY) {
        info!(
            correlation_id = %record.correlation_label(),
            category = category.unwrap_or(NONE_PLACEHOLDER),
            "Skipping non-Administrative log entry"
        );
        return Ok(None);
    }

    let event_time = match &record.time {
        Some(Value::String(raw)) => format_event_time(raw)?,
        Some(other) => {
            return Err(TransformError::InvalidTimestamp {
                value: other.to_string(),
                reason: "time is not a string".to_string(),
            })
        }
        None => return Err(TransformError::MissingTimestamp),
    };

    let uid = format!("{}-{}", record.correlation_label(), Uuid::new_v4());

    let placeholder = || Value::String(NONE_PLACEHOLDER.to_string());
    let field = |value: &Option<Value>| value.clone().unwrap_or(Value::Null);

    Ok(Some(NormalizedAuditEvent {
        version: field(&record.release_version),
        user_identity: UserIdentity {
            identity_type: config.default_user_type.clone(),
            principal_id: record
                .claim(PRINCIPAL_CLAIM)
                .cloned()
                .unwrap_or_else(placeholder),
            details: record.identity.clone().unwrap_or_else(placeholder),
        },
        user_agent: NONE_PLACEHOLDER.to_string(),
        event_source: field(&record.resource_id),
        event_name: field(&record.operation_name),
        event_time,
        uid,
        request_parameters: Value::Object(Map::new()),
        response_elements: Value::Object(Map::new()),
        source_ip_address: field(&record.caller_ip_address),
        recipient_account_id: config.recipient_account_id.clone(),
        additional_event_data: record.properties.clone().unwrap_or(Value::Null),
    }))
}

/// Transforms one record into a submission entry, carrying the event id alongside its payload.
pub fn transform_entry(
    record: &RawLogRecord,
    config: &TransformConfig,
) -> Result<Option<AuditEvent>, TransformError> {
    let Some(event) = normalize(record, config)? else {
        return Ok(None);
    };

    debug!(uid = %event.uid, event_name = ?event.event_name, "Transformed entry");

    Ok(Some(AuditEvent {
        event_data: serde_json::to_string(&event)?,
        id: event.uid,
    }))
}

/// Decodes and transforms raw records in order, dropping rejected ones.
///
/// The first record that cannot be decoded or transformed aborts the whole batch.
pub fn transform_records(
    records: &[Value],
    config: &TransformConfig,
) -> Result<Vec<AuditEvent>, TransformError> {
    let mut events = Vec::with_capacity(records.len());
    for (index, raw) in records.iter().enumerate() {
        let record = RawLogRecord::deserialize(raw)
            .map_err(|source| TransformError::MalformedRecord { index, source })?;
        if let Some(event) = transform_entry(&record, config)? {
            events.push(event);
        }
    }
    debug!(
        "Transformed {} of {} log entries",
        events.len(),
        records.len()
    );
    Ok(events)
}
