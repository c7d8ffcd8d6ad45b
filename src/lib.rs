//! # lawchunk
//!
//! Turn legal PDFs into retrieval-ready chunks that remember which page and
//! which chapter they came from.
//!
//! ## Why this crate?
//!
//! Splitting a law into fixed-size windows loses the two things a reader of
//! a retrieved chunk needs most: the chapter it belongs to and the page to
//! cite. This crate keeps both. Every page start is marked in the text
//! before splitting, chapter openings are turned into headings, and each
//! chunk carries its heading trail, its page numbers, a stable id and the
//! name of its source document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate path / bytes (%PDF magic)
//!  ├─ 2. Render     text layer via pdfium, or page images via a VLM
//!  ├─ 3. Paginate   "-----" page breaks → "_Page N starts_" markers
//!  ├─ 4. Normalize  "Kapitel 3\n\n_Title_" → "### Kapitel 3: Title"
//!  ├─ 5. Split      by #/##/### headings, then ≤1500-char windows
//!  ├─ 6. Process    header prefix, page backfill, ids, page_numbers
//!  ├─ 7. Enrich     (optional) LLM context per chunk
//!  └─ 8. Persist    <title>_chunks.json + <title>.md
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lawchunk::{chunk_to_files, ChunkingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChunkingConfig::builder().source_name("Lejeloven").build()?;
//!     let result = chunk_to_files("lejeloven.pdf", None, "out", &config).await?;
//!     println!("{} chunks in {}", result.chunks.len(), result.chunk_file.display());
//!     Ok(())
//! }
//! ```
//!
//! The post-processor is usable on its own for chunks from any splitter:
//!
//! ```rust
//! use lawchunk::{process, Chunk, ProcessOptions};
//!
//! let chunks = vec![Chunk::new("Lejeloven text").with_meta("#", "Kapitel 1")];
//! let out = process(chunks, &ProcessOptions::new("Lejeloven"));
//! assert_eq!(out[0].content, "_Page 1 starts_\n# Kapitel 1\nLejeloven text");
//! assert_eq!(out[0].page_numbers(), vec![1]);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `lawchunk` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## pdfium
//!
//! Rendering needs the pdfium shared library at runtime. Point
//! `PDFIUM_LIB_PATH` at the directory that holds it, or install it where the
//! system loader looks. Everything after rendering ([`chunk_text`],
//! [`process`], the serializer) works without it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod chunk;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod serialize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use chunk::{Chunk, Metadata};
pub use config::{ChunkingConfig, ChunkingConfigBuilder, PageMarker, RenderMode};
pub use convert::{
    artifact_paths, chunk_bytes, chunk_document, chunk_markdown, chunk_sync, chunk_text,
    chunk_to_files, prepare_markdown, resolve_provider,
};
pub use error::{EnrichError, LawChunkError, SummarizeError};
pub use output::{ChunkingOutput, ChunkingStats, EnrichmentStats, PersistedChunks, TokenUsage};
pub use pipeline::enrich::{enrich_chunks, ContextSummarizer, EnrichOptions, LlmSummarizer, Summary};
pub use pipeline::normalize::normalize;
pub use pipeline::paginate::inject;
pub use pipeline::process::{process, ProcessOptions};
pub use progress::{ChunkingProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use serialize::{read_chunks, to_json, write_json, Payload, ToRecord};
