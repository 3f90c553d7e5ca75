use serde::{Deserialize, Serialize};
use std::fmt;
use crate::catalog::CatalogEntry;
use crate::status::WatchStatus;

/// Classification of one reconciled import entry
///
/// `Update` and `NoChange` exist for metadata-level diffing; reconciliation
/// currently never emits them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    New,
    Update,
    StatusChange,
    NoChange,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::New => "NEW",
            ChangeKind::Update => "UPDATE",
            ChangeKind::StatusChange => "STATUS_CHANGE",
            ChangeKind::NoChange => "NO_CHANGE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change produced by reconciliation, consumed by the change applier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    pub external_id: i64,
    pub kind: ChangeKind,
    pub title: String,
    /// Human-readable descriptions, e.g. `Status: TO_WATCH -> COMPLETED`
    pub changes: Vec<String>,
    /// New catalog data; only set for `New`, and only with the bare ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<CatalogEntry>,
    pub target_status: WatchStatus,
}
