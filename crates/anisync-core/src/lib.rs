pub mod apply;
pub mod cache;
pub mod diff;
pub mod error;
pub mod identity;
pub mod import;
pub mod pipeline;
pub mod status;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use apply::{ApplyFailure, ApplySummary, ChangeApplier};
pub use cache::RawPageCache;
pub use diff::{compute_diff, resolve_record_id, CatalogSnapshot, WatchSnapshot};
pub use error::{ApplyError, ImportError, PipelineError, StoreError};
pub use identity::extract_external_id;
pub use import::{
    parse_import_document, read_import_file, ImportActions, ScanReport, SmartSyncReport, UnresolvedRecord,
};
pub use pipeline::{
    status_map, work_queue, BulkSync, BulkSyncReport, FullSyncOptions, HaltReason, IngestReport, ProgressCallback,
    ProgressEvent,
};
pub use status::{known_status, normalize_status, KNOWN_CATEGORY_LABELS};
pub use store::{CatalogStore, SqliteStore};
