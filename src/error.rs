//! Error types for the lawchunk library.
//!
//! Two error types for two failure modes:
//!
//! * [`LawChunkError`] — **Fatal**: the document cannot be chunked at all
//!   (missing file, corrupt PDF, unwritable output, bad configuration).
//!   Returned as `Err(LawChunkError)` from the top-level `chunk_*` functions.
//!   No partial markdown or chunk file is produced.
//!
//! * [`EnrichError`] — **Non-fatal**: the contextual summary for a single
//!   chunk failed. The chunk is kept without a summary, the failure is
//!   counted in [`crate::output::EnrichmentStats`], and the remaining chunks
//!   are still enriched.
//!
//! Page-marker pattern misses are not errors at all: a malformed marker is
//! simply treated as "no marker present".

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the lawchunk library.
#[derive(Debug, Error)]
pub enum LawChunkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No file at the given path.
    #[error("No PDF at '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file exists but cannot be opened for reading.
    #[error("Cannot read '{path}': permission denied")]
    PermissionDenied { path: PathBuf },

    /// The file (or byte buffer) is not a PDF.
    #[error("Input is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not parse the document.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The document is encrypted and no password was configured.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// The configured password did not open the document.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// A page could not be turned into text.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// An LLM is required (vision rendering or enrichment) but the provider
    /// could not be constructed.
    #[error("No usable LLM provider ({provider}).\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted chunk file exists but could not be read back.
    #[error("Failed to read cached chunk file '{path}': {detail}")]
    CacheReadFailed { path: PathBuf, detail: String },

    /// Chunks could not be encoded as JSON.
    #[error("Failed to serialise chunks: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Rejected by `ChunkingConfigBuilder::build` or a page-marker template.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// libpdfium could not be loaded.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium,\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A blocking task panicked or a runtime could not be created.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single chunk's contextual summary.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum EnrichError {
    /// The summarizer failed after all retries.
    #[error("Chunk {index}: summary failed after {retries} retries: {detail}")]
    SummaryFailed {
        index: usize,
        retries: u32,
        detail: String,
    },

    /// The summarizer returned nothing usable.
    #[error("Chunk {index}: summarizer returned an empty context")]
    EmptySummary { index: usize },
}

/// Failure of one [`crate::ContextSummarizer::summarize`] call.
///
/// Carries only a message; the enrichment loop decides whether to retry and
/// turns the final failure into an [`EnrichError`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SummarizeError(pub String);

impl SummarizeError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_write_failed_display() {
        let e = LawChunkError::OutputWriteFailed {
            path: PathBuf::from("/nope/chunks.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/nope/chunks.json"), "got: {msg}");
        assert!(msg.contains("denied"), "got: {msg}");
    }

    #[test]
    fn not_a_pdf_display_shows_magic() {
        let e = LawChunkError::NotAPdf {
            path: PathBuf::from("notes.txt"),
            magic: *b"Hell",
        };
        assert!(e.to_string().contains("notes.txt"));
    }

    #[test]
    fn summary_failed_display() {
        let e = EnrichError::SummaryFailed {
            index: 7,
            retries: 3,
            detail: "rate limited".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Chunk 7"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn invalid_config_display() {
        let e = LawChunkError::InvalidConfig("overlap too large".into());
        assert_eq!(e.to_string(), "Invalid configuration: overlap too large");
    }
}
