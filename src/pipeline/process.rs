//! Chunk post-processing.
//!
//! Seven passes turn raw splitter output into retrieval-ready chunks. They
//! run in a fixed order because later passes depend on earlier ones: the
//! header prefix must land before page backfill looks at the start of the
//! content, and page numbers are read only after trailing markers are gone.
//!
//! Every pass takes the chunk list by value and hands back the new list.

use crate::chunk::{display_value, Chunk};
use crate::config::PageMarker;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// Inputs shared by the passes.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub marker: PageMarker,
    pub source_name: String,
}

impl ProcessOptions {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            marker: PageMarker::default(),
            source_name: source_name.into(),
        }
    }

    pub fn with_marker(mut self, marker: PageMarker) -> Self {
        self.marker = marker;
        self
    }
}

/// Run every pass in order. Never fails; empty in, empty out.
pub fn process(chunks: Vec<Chunk>, opts: &ProcessOptions) -> Vec<Chunk> {
    let incoming = chunks.len();

    let chunks = prefix_headers(chunks);
    let chunks = backfill_page_markers(chunks, &opts.marker);
    let chunks = strip_trailing_markers(chunks, &opts.marker);
    let chunks = drop_non_alphabetic(chunks, &opts.marker);
    let chunks = assign_ids(chunks);
    let chunks = set_source_name(chunks, &opts.source_name);
    let chunks = extract_page_numbers(chunks, &opts.marker);

    debug!(
        incoming,
        kept = chunks.len(),
        dropped = incoming - chunks.len(),
        "Post-processed chunks"
    );
    chunks
}

/// Prepend one `"<key> <value>"` line per metadata entry, then a newline.
///
/// Runs first, so the only keys present are the splitter's heading keys.
pub fn prefix_headers(chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            let headers = chunk
                .metadata
                .iter()
                .map(|(key, value)| format!("{key} {}", display_value(value)))
                .collect::<Vec<_>>()
                .join("\n");
            chunk.content = format!("{headers}\n{}", chunk.content);
            chunk
        })
        .collect()
}

/// Make every chunk start with a page marker.
///
/// A chunk that does not already start with one (after leading whitespace)
/// gets the marker of the last page seen in an earlier chunk, starting at 1.
/// The last marker inside each chunk then becomes the page carried forward.
pub fn backfill_page_markers(chunks: Vec<Chunk>, marker: &PageMarker) -> Vec<Chunk> {
    let mut last_page = 1;

    chunks
        .into_iter()
        .map(|mut chunk| {
            let body = chunk.content.trim_start();
            if !marker.starts_text(body) {
                chunk.content = format!("{}{}", marker.framed(last_page), body);
            }
            if let Some(page) = marker.last_page(&chunk.content) {
                last_page = page;
            }
            chunk
        })
        .collect()
}

/// Trim content and remove markers left dangling at the end.
///
/// A window can end right on a page break; that marker belongs to the next
/// chunk, which gets it back through backfill.
pub fn strip_trailing_markers(chunks: Vec<Chunk>, marker: &PageMarker) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            let mut text = chunk.content.trim();
            while let Some(rest) = marker.strip_trailing(text) {
                text = rest.trim();
            }
            chunk.content = text.to_string();
            chunk
        })
        .collect()
}

/// Drop chunks with no alphabetic character outside their page markers.
pub fn drop_non_alphabetic(chunks: Vec<Chunk>, marker: &PageMarker) -> Vec<Chunk> {
    chunks
        .into_iter()
        .filter(|chunk| {
            let keep = marker
                .strip_all(&chunk.content)
                .chars()
                .any(char::is_alphabetic);
            if !keep {
                debug!(content = %chunk.content, "Dropping chunk without letters");
            }
            keep
        })
        .collect()
}

/// Replace any inherited `id`/`type` with a fresh UUID v4 `id`.
pub fn assign_ids(chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            chunk.metadata.shift_remove("id");
            chunk.metadata.shift_remove("type");
            chunk
                .metadata
                .insert("id".into(), Value::String(Uuid::new_v4().to_string()));
            chunk
        })
        .collect()
}

/// Label every chunk with the document it came from.
pub fn set_source_name(chunks: Vec<Chunk>, source_name: &str) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            chunk
                .metadata
                .insert("source_name".into(), Value::String(source_name.to_string()));
            chunk
        })
        .collect()
}

/// Record the page numbers of every marker present in the final content.
pub fn extract_page_numbers(chunks: Vec<Chunk>, marker: &PageMarker) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(|mut chunk| {
            let pages: Vec<Value> = marker
                .page_numbers(&chunk.content)
                .into_iter()
                .map(Value::from)
                .collect();
            chunk
                .metadata
                .insert("page_numbers".into(), Value::Array(pages));
            chunk
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn marker() -> PageMarker {
        PageMarker::default()
    }

    #[test]
    fn header_prefix_reference_example() {
        let chunks = vec![Chunk::new("Lejeloven text").with_meta("#", "Kapitel 1")];
        let out = prefix_headers(chunks);
        assert_eq!(out[0].content, "# Kapitel 1\nLejeloven text");
    }

    #[test]
    fn header_prefix_follows_metadata_order() {
        let chunks = vec![Chunk::new("body")
            .with_meta("#", "Lov")
            .with_meta("###", "Kapitel 2: Husleje")];
        let out = prefix_headers(chunks);
        assert_eq!(out[0].content, "# Lov\n### Kapitel 2: Husleje\nbody");
    }

    #[test]
    fn header_prefix_without_metadata_adds_newline() {
        let out = prefix_headers(vec![Chunk::new("body")]);
        assert_eq!(out[0].content, "\nbody");
    }

    #[test]
    fn backfill_carries_last_page_forward() {
        let chunks = vec![
            Chunk::new("intro text"),
            Chunk::new("end of one\n_Page 2 starts_\nstart of two\n_Page 3 starts_\nmore"),
            Chunk::new("  still three"),
        ];
        let out = backfill_page_markers(chunks, &marker());
        assert_eq!(out[0].content, "\n_Page 1 starts_\nintro text");
        assert!(out[1].content.starts_with("\n_Page 1 starts_\nend of one"));
        assert_eq!(out[2].content, "\n_Page 3 starts_\nstill three");
    }

    #[test]
    fn backfill_follows_last_marker_even_backwards() {
        let chunks = vec![
            Chunk::new("_Page 5 starts_\nfem\n_Page 3 starts_\ntre"),
            Chunk::new("uden markør"),
        ];
        let out = backfill_page_markers(chunks, &marker());
        assert_eq!(out[1].content, "\n_Page 3 starts_\nuden markør");
    }

    #[test]
    fn backfill_leaves_marked_chunk_alone() {
        let chunks = vec![Chunk::new("\n_Page 4 starts_\nbody")];
        let out = backfill_page_markers(chunks, &marker());
        assert_eq!(out[0].content, "\n_Page 4 starts_\nbody");
    }

    #[test]
    fn trailing_markers_removed_repeatedly() {
        let chunks = vec![Chunk::new(
            "  text\n_Page 2 starts_\n\n_Page 3 starts_\n  ",
        )];
        let out = strip_trailing_markers(chunks, &marker());
        assert_eq!(out[0].content, "text");
    }

    #[test]
    fn inner_markers_survive_trailing_strip() {
        let chunks = vec![Chunk::new("_Page 1 starts_\na\n_Page 2 starts_\nb")];
        let out = strip_trailing_markers(chunks, &marker());
        assert_eq!(out[0].content, "_Page 1 starts_\na\n_Page 2 starts_\nb");
    }

    #[test]
    fn alphabetic_filter_ignores_marker_words() {
        let chunks = vec![
            Chunk::new("_Page 3 starts_\n12 34 -- ."),
            Chunk::new("_Page 3 starts_\n§ 5. Stk. 2"),
            Chunk::new("æøå"),
        ];
        let out = drop_non_alphabetic(chunks, &marker());
        assert_eq!(out.len(), 2);
        assert!(out[0].content.contains("Stk"));
        assert_eq!(out[1].content, "æøå");
    }

    #[test]
    fn ids_replace_inherited_id_and_type() {
        let chunks = vec![Chunk::new("a")
            .with_meta("#", "Lov")
            .with_meta("id", "old")
            .with_meta("type", "Document")];
        let out = assign_ids(chunks);
        let meta = &out[0].metadata;
        assert!(!meta.contains_key("type"));
        assert_ne!(out[0].id(), Some("old"));
        assert!(Uuid::parse_str(out[0].id().unwrap()).is_ok());
        let keys: Vec<&str> = meta.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["#", "id"]);
    }

    #[test]
    fn page_numbers_match_markers_in_content() {
        let chunks = vec![
            Chunk::new("_Page 2 starts_\nx\n_Page 3 starts_\ny"),
            Chunk::new("no markers"),
        ];
        let out = extract_page_numbers(chunks, &marker());
        assert_eq!(out[0].page_numbers(), vec![2, 3]);
        assert_eq!(out[1].metadata["page_numbers"], Value::Array(vec![]));
    }

    #[test]
    fn process_empty_is_empty() {
        assert!(process(Vec::new(), &ProcessOptions::new("Lov")).is_empty());
    }

    #[test]
    fn process_full_run() {
        let chunks = vec![
            Chunk::new("§ 1. Loven gælder for leje.\n_Page 2 starts_\n")
                .with_meta("#", "Lejeloven")
                .with_meta("###", "Kapitel 1: Område"),
            Chunk::new("42").with_meta("###", "Kapitel 1: Område"),
            Chunk::new("§ 2. Lejeren betaler.\n_Page 3 starts_\nStk. 2. Mere.")
                .with_meta("###", "Kapitel 2: Husleje"),
        ];
        let opts = ProcessOptions::new("Lejeloven");
        let out = process(chunks, &opts);

        // "42" keeps its "### Kapitel 1" prefix, so it still has letters.
        assert_eq!(out.len(), 3);

        let first = &out[0];
        assert!(first.content.starts_with("_Page 1 starts_\n# Lejeloven\n### Kapitel 1: Område"));
        assert!(!first.content.ends_with("starts_"));
        assert_eq!(first.page_numbers(), vec![1]);
        assert_eq!(first.meta_str("source_name"), Some("Lejeloven"));

        let keys: Vec<&str> = first.metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["#", "###", "id", "source_name", "page_numbers"]);

        // Backfilled from the "42" chunk, which inherited page 2.
        assert_eq!(out[2].page_numbers(), vec![2, 3]);

        let ids: HashSet<&str> = out.iter().filter_map(Chunk::id).collect();
        assert_eq!(ids.len(), out.len());
    }

    #[test]
    fn process_drops_marker_only_chunks() {
        let chunks = vec![Chunk::new("_Page 1 starts_\n\n---\n")];
        assert!(process(chunks, &ProcessOptions::new("x")).is_empty());
    }

    #[test]
    fn fresh_ids_every_run() {
        let chunks = vec![Chunk::new("tekst")];
        let opts = ProcessOptions::new("x");
        let a = process(chunks.clone(), &opts);
        let b = process(chunks, &opts);
        assert_ne!(a[0].id(), b[0].id());
    }
}
