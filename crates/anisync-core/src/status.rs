use anisync_models::WatchStatus;

/// Category labels the export format uses, with the status each maps to
pub const KNOWN_CATEGORY_LABELS: [(&str, WatchStatus); 5] = [
    ("To watch", WatchStatus::ToWatch),
    ("Planning", WatchStatus::Planning),
    ("Dropped", WatchStatus::Dropped),
    ("On-Hold", WatchStatus::OnHold),
    ("Completed", WatchStatus::Completed),
];

/// Status for a known category label, `None` for anything else
///
/// Matching is exact and case-sensitive; "completed" or "Completed " are unknown labels.
pub fn known_status(label: &str) -> Option<WatchStatus> {
    KNOWN_CATEGORY_LABELS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, status)| *status)
}

/// Map an export category label to a watch status; unknown labels map to `Unknown`
pub fn normalize_status(label: &str) -> WatchStatus {
    known_status(label).unwrap_or(WatchStatus::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(normalize_status("To watch"), WatchStatus::ToWatch);
        assert_eq!(normalize_status("Planning"), WatchStatus::Planning);
        assert_eq!(normalize_status("Dropped"), WatchStatus::Dropped);
        assert_eq!(normalize_status("On-Hold"), WatchStatus::OnHold);
        assert_eq!(normalize_status("Completed"), WatchStatus::Completed);
    }

    #[test]
    fn test_unknown_labels() {
        for label in ["", "completed", "Completed ", "To Watch", "On Hold", "Watching", "UNKNOWN", "COMPLETED"] {
            assert_eq!(normalize_status(label), WatchStatus::Unknown, "label {:?}", label);
            assert_eq!(known_status(label), None);
        }
    }
}
