// Reconciliation of an import document against the persisted library

use crate::identity::extract_external_id;
use crate::status::normalize_status;
use anisync_models::{CatalogEntry, ChangeKind, ChangeRecord, ImportDocument, ImportRecord, WatchStatus};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Every known catalog entry, keyed by external ID
pub type CatalogSnapshot = HashMap<i64, CatalogEntry>;

/// Current watch status per external ID (rows without a status are left out)
pub type WatchSnapshot = HashMap<i64, WatchStatus>;

/// External ID of an import record: permalink first, then the ID the caller
/// resolved by title lookup
pub fn resolve_record_id(record: &ImportRecord) -> Option<i64> {
    extract_external_id(record.al.as_deref()).or(record.resolved_id)
}

/// Classify every import record against the current catalog and watch state.
///
/// Categories are walked in document order and records in list order. Each
/// external ID is classified once per call; a later occurrence of an ID that
/// was already seen is dropped, so the first category it appears under wins.
///
/// * No catalog entry for the ID: a `New` record whose payload is the bare ID.
/// * A watch status that differs from the category's: a `StatusChange` record.
/// * Anything else produces no record.
///
/// Records that resolve to no ID are skipped; callers report them as unresolved.
/// Pure, performs no I/O.
pub fn compute_diff(
    document: &ImportDocument,
    catalog: &CatalogSnapshot,
    watch: &WatchSnapshot,
) -> Vec<ChangeRecord> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut changes = Vec::new();
    let mut skipped_unresolved = 0usize;
    let mut skipped_duplicate = 0usize;

    for category in &document.categories {
        let target_status = normalize_status(&category.label);

        for record in &category.records {
            let Some(id) = resolve_record_id(record) else {
                skipped_unresolved += 1;
                continue;
            };

            if !seen.insert(id) {
                skipped_duplicate += 1;
                continue;
            }

            match catalog.get(&id) {
                None => changes.push(ChangeRecord {
                    external_id: id,
                    kind: ChangeKind::New,
                    title: record.name.clone(),
                    changes: vec!["New Entry".to_string()],
                    payload: Some(CatalogEntry::bare(id)),
                    target_status,
                }),
                Some(entry) => {
                    if let Some(current) = watch.get(&id) {
                        if *current != target_status {
                            changes.push(ChangeRecord {
                                external_id: id,
                                kind: ChangeKind::StatusChange,
                                title: entry.display_title().to_string(),
                                changes: vec![format!("Status: {} -> {}", current, target_status)],
                                payload: None,
                                target_status,
                            });
                        }
                    }
                }
            }
        }
    }

    debug!(
        "compute_diff: changes={}, skipped_unresolved={}, skipped_duplicate={}",
        changes.len(),
        skipped_unresolved,
        skipped_duplicate
    );

    changes
}
