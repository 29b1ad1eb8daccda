//! The fixed extraction schema and the record type it describes.
//!
//! [`FIELDS`] is the single source of truth for the field set: the extraction
//! prompt in [`crate::prompts`] is generated from it, and
//! [`ExtractedRecord::missing_fields`] checks model output against it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One field the model is asked to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// JSON key in the extracted record.
    pub name: &'static str,
    /// Human-readable hint included in the extraction prompt.
    pub description: &'static str,
}

/// Key added by the orchestrator before persisting a record.
pub const FILE_URL_KEY: &str = "file_url";

/// Every field of an identity / residence document, in prompt order.
pub const FIELDS: [FieldSpec; 13] = [
    FieldSpec {
        name: "country",
        description: r#"The country that issued the document (string, e.g., "UNITED ARAB EMIRATES")."#,
    },
    FieldSpec {
        name: "residence_type",
        description: r#"The type of residence permit (string, e.g., "RESIDENCE")."#,
    },
    FieldSpec {
        name: "residence_status",
        description: r#"The residence status (string, if available, e.g., "إقامة جديدة")."#,
    },
    FieldSpec {
        name: "id_number",
        description: "The ID number on the document (string).",
    },
    FieldSpec {
        name: "file_number",
        description: "The file number on the document (string).",
    },
    FieldSpec {
        name: "passport_number",
        description: "The passport number on the document (string).",
    },
    FieldSpec {
        name: "name",
        description: "The full name of the person on the document (string).",
    },
    FieldSpec {
        name: "arabic_name",
        description: "The name in Arabic (string, if present).",
    },
    FieldSpec {
        name: "occupation",
        description: "The person's occupation (string).",
    },
    FieldSpec {
        name: "company",
        description: "The name of the company (string, if applicable).",
    },
    FieldSpec {
        name: "issue_date",
        description: r#"The date the document was issued (string, format "YYYY/MM/DD")."#,
    },
    FieldSpec {
        name: "expiry_date",
        description: r#"The document's expiry date (string, format "YYYY/MM/DD")."#,
    },
    FieldSpec {
        name: "place_of_issue",
        description: r#"The place where the document was issued (string, e.g., "DUBAI")."#,
    },
];

/// Iterate over the schema's field names in prompt order.
pub fn field_names() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|f| f.name)
}

/// Structured data extracted from one document image.
///
/// Values are JSON strings or `null`. An empty record means extraction
/// produced nothing usable (blocked, unparseable or irrecoverable output);
/// use [`crate::pipeline::salvage::salvage_outcome`] when the reason matters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedRecord(Map<String, Value>);

impl ExtractedRecord {
    /// A record with zero keys.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The string value of `key`, or `None` when absent or `null`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Schema fields that do not appear as keys in this record.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        field_names().filter(|name| !self.0.contains_key(*name)).collect()
    }

    /// Record where the blob was stored, ahead of persistence.
    pub fn attach_file_url(&mut self, url: impl Into<String>) {
        self.0
            .insert(FILE_URL_KEY.to_string(), Value::String(url.into()));
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ExtractedRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_has_thirteen_unique_fields() {
        let mut names: Vec<_> = field_names().collect();
        assert_eq!(names.len(), 13);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 13);
    }

    #[test]
    fn missing_fields_lists_absent_schema_keys() {
        let map = json!({"country": "UAE", "name": null})
            .as_object()
            .cloned()
            .unwrap();
        let record = ExtractedRecord::from(map);
        let missing = record.missing_fields();
        assert_eq!(missing.len(), 11);
        assert!(!missing.contains(&"country"));
        assert!(!missing.contains(&"name"));
        assert!(missing.contains(&"place_of_issue"));
    }

    #[test]
    fn attach_file_url_adds_key() {
        let mut record = ExtractedRecord::empty();
        record.attach_file_url("https://bucket.s3.amazonaws.com/card.png");
        assert_eq!(
            record.get_str(FILE_URL_KEY),
            Some("https://bucket.s3.amazonaws.com/card.png")
        );
    }

    #[test]
    fn serialises_transparently() {
        let map = json!({"country": "UAE", "id_number": null})
            .as_object()
            .cloned()
            .unwrap();
        let record = ExtractedRecord::from(map);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"country":"UAE","id_number":null}"#
        );
        assert_eq!(serde_json::to_string(&ExtractedRecord::empty()).unwrap(), "{}");
    }
}
