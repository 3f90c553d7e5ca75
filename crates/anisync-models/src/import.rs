use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One entry of the exported watch-list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportRecord {
    pub name: String,
    /// Alternate-catalog identifier, carried through but never used for matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mal: Option<String>,
    /// Catalog permalink, e.g. `https://anilist.co/anime/21/one-piece`
    #[serde(default)]
    pub al: Option<String>,
    /// Catalog ID found by title lookup when the permalink is missing or unusable
    #[serde(skip)]
    pub resolved_id: Option<i64>,
}

impl ImportRecord {
    pub fn new(name: impl Into<String>, al: Option<&str>) -> Self {
        Self {
            name: name.into(),
            mal: None,
            al: al.map(str::to_string),
            resolved_id: None,
        }
    }
}

/// A category label and the records exported under it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCategory {
    pub label: String,
    pub records: Vec<ImportRecord>,
}

/// The whole export file: category label -> records, in file order
///
/// Deserialization keeps the order of the JSON object's keys because the
/// first category an ID appears under decides its classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDocument {
    pub categories: Vec<ImportCategory>,
}

impl ImportDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, label: impl Into<String>, records: Vec<ImportRecord>) -> Self {
        self.categories.push(ImportCategory {
            label: label.into(),
            records,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.records.is_empty())
    }

    pub fn record_count(&self) -> usize {
        self.categories.iter().map(|c| c.records.len()).sum()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut ImportRecord> {
        self.categories.iter_mut().flat_map(|c| c.records.iter_mut())
    }
}

impl Serialize for ImportDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.label, &category.records)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ImportDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = ImportDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category labels to lists of entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut categories = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, records)) = access.next_entry::<String, Vec<ImportRecord>>()? {
                    categories.push(ImportCategory { label, records });
                }
                Ok(ImportDocument { categories })
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_keeps_category_order() {
        let json = r#"{
            "Watching later": [{"name": "B", "mal": "2", "al": null}],
            "Completed": [{"name": "A", "al": "https://anilist.co/anime/1"}],
            "Dropped": []
        }"#;
        let doc: ImportDocument = serde_json::from_str(json).unwrap();
        let labels: Vec<&str> = doc.categories.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Watching later", "Completed", "Dropped"]);
        assert_eq!(doc.record_count(), 2);
        assert_eq!(doc.categories[0].records[0].al, None);
        assert_eq!(doc.categories[0].records[0].mal.as_deref(), Some("2"));
        assert_eq!(doc.categories[1].records[0].resolved_id, None);
    }

    #[test]
    fn test_deserialize_rejects_wrong_shape() {
        assert!(serde_json::from_str::<ImportDocument>("[]").is_err());
        assert!(serde_json::from_str::<ImportDocument>(r#"{"Completed": {"name": "x"}}"#).is_err());
        assert!(serde_json::from_str::<ImportDocument>(r#"{"Completed": [{"al": "x"}]}"#).is_err());
    }

    #[test]
    fn test_empty_document() {
        let doc: ImportDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.record_count(), 0);
    }

    #[test]
    fn test_serialize_as_object() {
        let doc = ImportDocument::new()
            .with_category("Planning", vec![ImportRecord::new("Mushishi", Some("https://anilist.co/anime/457"))]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["Planning"][0]["name"], "Mushishi");
        assert_eq!(value["Planning"][0]["al"], "https://anilist.co/anime/457");
    }
}
