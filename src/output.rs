//! Result types returned by the chunking entry points.

use crate::chunk::Chunk;
use crate::error::EnrichError;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use std::path::PathBuf;

/// The full result of chunking one document.
#[derive(Debug, Clone)]
pub struct ChunkingOutput {
    /// The prepared markdown (page markers injected, chapter headings
    /// normalised) that the chunks were split from.
    pub markdown: String,
    /// Final chunks, in document order.
    pub chunks: Vec<Chunk>,
    pub stats: ChunkingStats,
}

/// What [`crate::chunk_to_files`] produced (or found on disk).
#[derive(Debug, Clone)]
pub struct PersistedChunks {
    pub chunks: Vec<Chunk>,
    pub chunk_file: PathBuf,
    /// `None` when markdown persistence is disabled or the result came from cache.
    pub markdown_file: Option<PathBuf>,
    /// True when an existing chunk file was returned without rendering.
    pub from_cache: bool,
    /// `None` for cached results.
    pub stats: Option<ChunkingStats>,
}

/// Counters for one chunking run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkingStats {
    /// Pages rendered from the PDF (0 when chunking markdown directly).
    pub total_pages: usize,
    /// Windows produced by the splitter.
    pub raw_chunks: usize,
    /// Chunks that survived post-processing.
    pub final_chunks: usize,
    /// Windows dropped for having no letters.
    pub dropped_chunks: usize,
    /// Present only when enrichment ran.
    pub enrichment: Option<EnrichmentStats>,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Token counts reported by the LLM.
///
/// Cache counters stay zero when the provider does not report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_creation_input_tokens
            + self.cache_read_input_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.cache_creation_input_tokens += rhs.cache_creation_input_tokens;
        self.cache_read_input_tokens += rhs.cache_read_input_tokens;
    }
}

/// Outcome of the enrichment stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentStats {
    /// Chunks with a `###` heading that matched a chapter section.
    pub candidates: usize,
    pub enriched: usize,
    /// Chunks without a heading or without a matching section.
    pub skipped: usize,
    pub failed: usize,
    pub usage: TokenUsage,
    pub errors: Vec<EnrichError>,
}
