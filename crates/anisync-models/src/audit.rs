use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of event recorded in the audit log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    ImportScan,
    ApplyChange,
    Error,
    SmartSync,
    BulkSync,
    Ingest,
    StatusUpdate,
}

impl AuditEvent {
    const ALL: [AuditEvent; 7] = [
        AuditEvent::ImportScan,
        AuditEvent::ApplyChange,
        AuditEvent::Error,
        AuditEvent::SmartSync,
        AuditEvent::BulkSync,
        AuditEvent::Ingest,
        AuditEvent::StatusUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::ImportScan => "IMPORT_SCAN",
            AuditEvent::ApplyChange => "APPLY_CHANGE",
            AuditEvent::Error => "ERROR",
            AuditEvent::SmartSync => "SMART_SYNC",
            AuditEvent::BulkSync => "BULK_SYNC",
            AuditEvent::Ingest => "INGEST",
            AuditEvent::StatusUpdate => "STATUS_UPDATE",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| format!("Invalid audit event: {}", s))
    }
}

/// Append-only record of a reconciliation run or an applied change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLogEntry {
    /// Assigned by the datastore; `None` until persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub event: AuditEvent,
    pub description: String,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(event: AuditEvent, description: impl Into<String>, meta: serde_json::Value) -> Self {
        Self {
            id: None,
            event,
            description: description.into(),
            meta,
            created_at: Utc::now(),
        }
    }
}
