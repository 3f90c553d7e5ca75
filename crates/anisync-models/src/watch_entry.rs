use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::status::WatchStatus;

/// The local user's relationship with one catalog entry
///
/// `status == None` means the title was removed from the library; the row
/// itself is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserWatchEntry {
    pub external_id: i64,
    pub status: Option<WatchStatus>,
    pub updated_at: DateTime<Utc>,
}
