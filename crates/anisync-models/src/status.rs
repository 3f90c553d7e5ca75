use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of watch-status values a library entry can carry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchStatus {
    /// Marked "To watch" in the export
    ToWatch,
    /// Marked "Planning" in the export
    Planning,
    OnHold,
    Completed,
    Dropped,
    /// Category label the export used that we have no mapping for
    Unknown,
}

impl WatchStatus {
    pub const ALL: [WatchStatus; 6] = [
        WatchStatus::ToWatch,
        WatchStatus::Planning,
        WatchStatus::OnHold,
        WatchStatus::Completed,
        WatchStatus::Dropped,
        WatchStatus::Unknown,
    ];

    /// Storage / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::ToWatch => "TO_WATCH",
            WatchStatus::Planning => "PLANNING",
            WatchStatus::OnHold => "ON_HOLD",
            WatchStatus::Completed => "COMPLETED",
            WatchStatus::Dropped => "DROPPED",
            WatchStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid watch status: {}", s))
    }
}
