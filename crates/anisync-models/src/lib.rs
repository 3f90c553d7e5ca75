pub mod audit;
pub mod catalog;
pub mod change;
pub mod import;
pub mod status;
pub mod watch_entry;

pub use audit::{AuditEvent, AuditLogEntry};
pub use catalog::{CatalogEntry, RelatedTitle};
pub use change::{ChangeKind, ChangeRecord};
pub use import::{ImportCategory, ImportDocument, ImportRecord};
pub use status::WatchStatus;
pub use watch_entry::UserWatchEntry;
