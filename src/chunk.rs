//! The chunk value that flows from the splitter to the serializer.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Insertion-ordered chunk metadata.
///
/// Header splitting inserts `#`, `##`, `###` first; the post-processor then
/// appends `id`, `source_name` and `page_numbers`. Order is preserved all the
/// way to disk, so the header lines prefixed onto each chunk read top-down.
pub type Metadata = IndexMap<String, Value>;

/// A contiguous span of document text plus its metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Chunk {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insert, mostly useful in tests and fixtures.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// String metadata value for `key`, if present and a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// The `id` assigned by the post-processor.
    pub fn id(&self) -> Option<&str> {
        self.meta_str("id")
    }

    /// The `page_numbers` list written by the post-processor.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.metadata
            .get("page_numbers")
            .and_then(Value::as_array)
            .map(|nums| {
                nums.iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|n| u32::try_from(n).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Render a metadata value the way it appears in a header line: strings
/// verbatim, everything else as JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_keeps_insertion_order() {
        let chunk = Chunk::new("x")
            .with_meta("###", "c")
            .with_meta("#", "a")
            .with_meta("##", "b");
        let keys: Vec<&str> = chunk.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["###", "#", "##"]);
    }

    #[test]
    fn page_numbers_reads_list() {
        let chunk = Chunk::new("x").with_meta("page_numbers", json!([3, 4]));
        assert_eq!(chunk.page_numbers(), vec![3, 4]);
        assert!(Chunk::new("y").page_numbers().is_empty());
    }

    #[test]
    fn display_value_strings_unquoted() {
        assert_eq!(display_value(&json!("Kapitel 1")), "Kapitel 1");
        assert_eq!(display_value(&json!(12)), "12");
    }

    #[test]
    fn deserialises_persisted_shape() {
        let chunk: Chunk = serde_json::from_value(json!({
            "content": "Lejer",
            "metadata": {"#": "Lov", "id": "abc"}
        }))
        .unwrap();
        assert_eq!(chunk.content, "Lejer");
        assert_eq!(chunk.id(), Some("abc"));
        assert_eq!(chunk.meta_str("#"), Some("Lov"));
    }
}
