//! Configuration types for PDF chunking.
//!
//! Every knob lives in [`ChunkingConfig`], built via its
//! [`ChunkingConfigBuilder`]. Setters clamp obviously out-of-range values;
//! `build()` rejects combinations that cannot work (overlap not smaller than
//! the window, a page-marker template without a `{n}` slot).

use crate::error::LawChunkError;
use crate::pipeline::enrich::ContextSummarizer;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for turning one PDF into a chunk set.
///
/// # Example
/// ```rust
/// use lawchunk::{ChunkingConfig, RenderMode};
///
/// let config = ChunkingConfig::builder()
///     .render_mode(RenderMode::TextLayer)
///     .chunk_size(1200)
///     .chunk_overlap(80)
///     .source_name("Lejeloven")
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 1200);
/// ```
#[derive(Clone)]
pub struct ChunkingConfig {
    /// How PDF pages become markdown. Default: [`RenderMode::TextLayer`].
    pub render_mode: RenderMode,

    /// Maximum rasterised page edge in pixels (vision mode only). Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory holding the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, then to the system loader.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Page-marker template injected at every page start. Default: `_Page {n} starts_`.
    pub page_marker: PageMarker,

    /// Deepest markdown heading level that splits sections (1–6). Default: 3.
    pub header_depth: usize,

    /// Maximum characters per chunk window. Default: 1500.
    pub chunk_size: usize,

    /// Characters carried over between consecutive windows. Default: 100.
    pub chunk_overlap: usize,

    /// Provenance label written to every chunk's `source_name`.
    /// Falls back to the document title (or file stem) when unset.
    pub source_name: Option<String>,

    /// Append an LLM-generated context summary to each chunk. Default: false.
    pub enrich_context: bool,

    /// Language the context summaries are written in. Default: "Danish".
    pub context_language: String,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Custom summarizer for enrichment. Takes precedence over any LLM provider.
    pub summarizer: Option<Arc<dyn ContextSummarizer>>,

    /// Sampling temperature for LLM calls. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens per LLM response. Default: 5000.
    pub max_tokens: usize,

    /// Retry attempts per LLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Concurrent LLM calls (vision pages or enrichment chunks). Default: 8.
    pub concurrency: usize,

    /// Persist the prepared markdown next to the chunk file. Default: true.
    pub save_markdown: bool,

    /// Re-chunk even when a chunk file for the title already exists. Default: false.
    pub refresh_cache: bool,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::default(),
            max_rendered_pixels: 2000,
            password: None,
            pdfium_lib_path: None,
            page_marker: PageMarker::default(),
            header_depth: 3,
            chunk_size: 1500,
            chunk_overlap: 100,
            source_name: None,
            enrich_context: false,
            context_language: "Danish".to_string(),
            model: None,
            provider_name: None,
            provider: None,
            summarizer: None,
            temperature: 0.0,
            max_tokens: 5000,
            max_retries: 3,
            retry_backoff_ms: 500,
            concurrency: 8,
            save_markdown: true,
            refresh_cache: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ChunkingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkingConfig")
            .field("render_mode", &self.render_mode)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("page_marker", &self.page_marker.template())
            .field("header_depth", &self.header_depth)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("source_name", &self.source_name)
            .field("enrich_context", &self.enrich_context)
            .field("context_language", &self.context_language)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("summarizer", &self.summarizer.as_ref().map(|_| "<dyn ContextSummarizer>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("save_markdown", &self.save_markdown)
            .field("refresh_cache", &self.refresh_cache)
            .finish()
    }
}

impl ChunkingConfig {
    /// Create a new builder for `ChunkingConfig`.
    pub fn builder() -> ChunkingConfigBuilder {
        ChunkingConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether any stage of this configuration will call an LLM.
    pub fn needs_llm(&self) -> bool {
        self.render_mode == RenderMode::Vision || (self.enrich_context && self.summarizer.is_none())
    }
}

/// Builder for [`ChunkingConfig`].
#[derive(Debug)]
pub struct ChunkingConfigBuilder {
    config: ChunkingConfig,
}

impl ChunkingConfigBuilder {
    pub fn render_mode(mut self, mode: RenderMode) -> Self {
        self.config.render_mode = mode;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(dir.into());
        self
    }

    pub fn page_marker(mut self, marker: PageMarker) -> Self {
        self.config.page_marker = marker;
        self
    }

    pub fn header_depth(mut self, depth: usize) -> Self {
        self.config.header_depth = depth;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn source_name(mut self, name: impl Into<String>) -> Self {
        self.config.source_name = Some(name.into());
        self
    }

    pub fn enrich_context(mut self, v: bool) -> Self {
        self.config.enrich_context = v;
        self
    }

    pub fn context_language(mut self, lang: impl Into<String>) -> Self {
        self.config.context_language = lang.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn ContextSummarizer>) -> Self {
        self.config.summarizer = Some(summarizer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn save_markdown(mut self, v: bool) -> Self {
        self.config.save_markdown = v;
        self
    }

    pub fn refresh_cache(mut self, v: bool) -> Self {
        self.config.refresh_cache = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ChunkingConfig, LawChunkError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(LawChunkError::InvalidConfig(
                "Chunk size must be ≥ 1".into(),
            ));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(LawChunkError::InvalidConfig(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if !(1..=6).contains(&c.header_depth) {
            return Err(LawChunkError::InvalidConfig(format!(
                "Header depth must be 1–6, got {}",
                c.header_depth
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How PDF pages are turned into markdown text.
///
/// | Mode | Needs | Output |
/// |------|-------|--------|
/// | `TextLayer` | pdfium only | the embedded text, one block per page |
/// | `Vision` | pdfium + a vision LLM | structured markdown with headings and emphasis |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    /// Extract the PDF's embedded text layer. (default)
    #[default]
    TextLayer,
    /// Rasterise each page and transcribe it with a vision LLM.
    Vision,
}

// ── Page marker ──────────────────────────────────────────────────────────

/// Placeholder standing for the page number inside a marker template.
pub const PAGE_NUMBER_SLOT: &str = "{n}";

/// Default marker template.
pub const DEFAULT_PAGE_MARKER: &str = "_Page {n} starts_";

/// The synthetic page-start marker, e.g. `_Page 3 starts_`.
///
/// Built from a template containing exactly one `{n}`; the literal text on
/// either side is regex-escaped, so any template is matched verbatim.
/// When injected into a document the marker sits on its own line
/// (see [`PageMarker::framed`]).
#[derive(Debug, Clone)]
pub struct PageMarker {
    prefix: String,
    suffix: String,
    any: Regex,
    leading: Regex,
    trailing: Regex,
}

impl PageMarker {
    /// Parse a template such as `_Side {n} starter_`.
    pub fn new(template: &str) -> Result<Self, LawChunkError> {
        let (prefix, suffix) = template.split_once(PAGE_NUMBER_SLOT).ok_or_else(|| {
            LawChunkError::InvalidConfig(format!(
                "Page marker template '{template}' has no {PAGE_NUMBER_SLOT} slot"
            ))
        })?;
        if suffix.contains(PAGE_NUMBER_SLOT) {
            return Err(LawChunkError::InvalidConfig(format!(
                "Page marker template '{template}' has more than one {PAGE_NUMBER_SLOT} slot"
            )));
        }
        if prefix.trim().is_empty() && suffix.trim().is_empty() {
            return Err(LawChunkError::InvalidConfig(
                "Page marker template needs literal text around {n}".into(),
            ));
        }
        if prefix.contains('\n') || suffix.contains('\n') {
            return Err(LawChunkError::InvalidConfig(
                "Page marker template must fit on one line".into(),
            ));
        }

        let core = format!("{}(\\d+){}", regex::escape(prefix), regex::escape(suffix));
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| LawChunkError::InvalidConfig(e.to_string()))
        };

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            any: compile(core.clone())?,
            leading: compile(format!("^{core}"))?,
            trailing: compile(format!(r"{core}\s*\z"))?,
        })
    }

    /// The template this marker was built from.
    pub fn template(&self) -> String {
        format!("{}{PAGE_NUMBER_SLOT}{}", self.prefix, self.suffix)
    }

    /// The bare marker text for `page`, e.g. `_Page 3 starts_`.
    pub fn label(&self, page: u32) -> String {
        format!("{}{}{}", self.prefix, page, self.suffix)
    }

    /// The marker on its own line: `"\n_Page 3 starts_\n"`.
    pub fn framed(&self, page: u32) -> String {
        format!("\n{}\n", self.label(page))
    }

    /// Whether `text` begins with a marker (no whitespace skipping).
    pub fn starts_text(&self, text: &str) -> bool {
        self.leading.is_match(text)
    }

    /// Every page number found in `text`, in order of appearance.
    ///
    /// A marker whose number does not fit in a `u32` is ignored.
    pub fn page_numbers(&self, text: &str) -> Vec<u32> {
        self.any
            .captures_iter(text)
            .filter_map(|caps| caps[1].parse().ok())
            .collect()
    }

    /// The last page number found in `text`.
    pub fn last_page(&self, text: &str) -> Option<u32> {
        self.page_numbers(text).last().copied()
    }

    /// `text` with one trailing marker (plus trailing whitespace) removed,
    /// or `None` when it does not end with a marker.
    pub fn strip_trailing<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.trailing.find(text).map(|m| &text[..m.start()])
    }

    /// `text` with every marker removed.
    pub fn strip_all<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        self.any.replace_all(text, "")
    }
}

impl Default for PageMarker {
    fn default() -> Self {
        DEFAULT_MARKER.clone()
    }
}

impl PartialEq for PageMarker {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.suffix == other.suffix
    }
}

static DEFAULT_MARKER: Lazy<PageMarker> = Lazy::new(|| {
    PageMarker::new(DEFAULT_PAGE_MARKER).expect("default page marker template is valid")
});
