//! Contextual enrichment: append a short, LLM-written summary to each chunk
//! that situates it within its chapter.
//!
//! ## Flow
//!
//! ```text
//! prepared markdown ──▶ split on "###" (headings kept) ──▶ chapter sections
//!                                                              │
//! chunk["###"] ── first section with the same heading ─────────┘
//!        │
//!        └──▶ summarize(section, chunk) ──▶ content += "\n\n" + context
//!                                          metadata["context"] = context
//! ```
//!
//! Calls run concurrently (bounded by `concurrency`) and results are applied
//! by chunk index, so output order never depends on completion order. A chunk
//! whose call fails after all retries is left untouched and counted; it never
//! aborts the other chunks.

use crate::chunk::Chunk;
use crate::config::ChunkingConfig;
use crate::error::{EnrichError, SummarizeError};
use crate::output::{EnrichmentStats, TokenUsage};
use crate::pipeline::llm::{self, with_backoff};
use crate::pipeline::split::HeaderSplitter;
use crate::progress::ProgressCallback;
use crate::prompts;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Metadata key holding the chapter heading a chunk belongs to.
pub const SECTION_KEY: &str = "###";

/// Metadata key the summary is stored under.
pub const CONTEXT_KEY: &str = "context";

/// A generated context plus the tokens it cost.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub context: String,
    pub usage: TokenUsage,
}

/// Produces the situating context for one chunk.
///
/// `document` is the chapter the chunk came from, heading included.
/// Implement this to plug in a different model, a cache, or a test double.
#[async_trait]
pub trait ContextSummarizer: Send + Sync {
    async fn summarize(&self, document: &str, chunk: &str) -> Result<Summary, SummarizeError>;
}

/// [`ContextSummarizer`] backed by an `edgequake-llm` provider.
///
/// The chapter goes in its own system message ahead of the instruction, so
/// providers with prompt caching can reuse it for every chunk of the chapter.
pub struct LlmSummarizer {
    provider: Arc<dyn LLMProvider>,
    language: String,
    options: CompletionOptions,
}

impl LlmSummarizer {
    /// Default temperature and token limit, summaries in `language`.
    pub fn new(provider: Arc<dyn LLMProvider>, language: impl Into<String>) -> Self {
        Self {
            provider,
            language: language.into(),
            options: llm::build_options(&ChunkingConfig::default()),
        }
    }

    /// Take language, temperature and token limit from `config`.
    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &ChunkingConfig) -> Self {
        Self {
            provider,
            language: config.context_language.clone(),
            options: llm::build_options(config),
        }
    }
}

#[async_trait]
impl ContextSummarizer for LlmSummarizer {
    async fn summarize(&self, document: &str, chunk: &str) -> Result<Summary, SummarizeError> {
        let messages = vec![
            ChatMessage::system(prompts::document_context(document)),
            ChatMessage::user(prompts::chunk_context(chunk, &self.language)),
        ];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| SummarizeError::new(e.to_string()))?;

        // edgequake-llm reports prompt/completion tokens only.
        Ok(Summary {
            context: response.content.trim().to_string(),
            usage: TokenUsage {
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
                ..Default::default()
            },
        })
    }
}

/// Retry and concurrency knobs for [`enrich_chunks`].
#[derive(Debug, Clone, Copy)]
pub struct EnrichOptions {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

impl EnrichOptions {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Chapter sections of `markdown`: `(heading, section text)` pairs, in order.
///
/// Text before the first `###` heading has no heading and is not returned.
pub fn chapter_sections(markdown: &str) -> Vec<(String, String)> {
    HeaderSplitter::new([3])
        .keep_headers()
        .split(markdown)
        .into_iter()
        .filter_map(|section| {
            let heading = section.meta_str(SECTION_KEY)?.to_string();
            Some((heading, section.content))
        })
        .collect()
}

struct Job<'a> {
    index: usize,
    document: &'a str,
    chunk: String,
}

/// Append a context summary to every chunk whose `###` heading matches a
/// chapter of `markdown`.
pub async fn enrich_chunks(
    mut chunks: Vec<Chunk>,
    markdown: &str,
    summarizer: Arc<dyn ContextSummarizer>,
    opts: EnrichOptions,
    progress: Option<&ProgressCallback>,
) -> (Vec<Chunk>, EnrichmentStats) {
    let sections = chapter_sections(markdown);
    let mut stats = EnrichmentStats::default();

    let jobs: Vec<Job<'_>> = chunks
        .iter()
        .enumerate()
        .filter_map(|(index, chunk)| {
            let heading = chunk.meta_str(SECTION_KEY)?;
            let (_, document) = sections.iter().find(|(h, _)| h == heading)?;
            Some(Job {
                index,
                document: document.as_str(),
                chunk: chunk.content.clone(),
            })
        })
        .collect();

    stats.candidates = jobs.len();
    stats.skipped = chunks.len() - jobs.len();
    let total = chunks.len();
    info!(
        "Enriching {} of {} chunks ({} chapters)",
        stats.candidates,
        total,
        sections.len()
    );
    if let Some(cb) = progress {
        cb.on_enrichment_start(stats.candidates);
    }

    let summarizer: &dyn ContextSummarizer = summarizer.as_ref();
    let mut results: Vec<(usize, Result<Summary, EnrichError>)> = stream::iter(jobs)
        .map(|job| async move {
            let label = format!("Chunk {}", job.index);
            let document = job.document;
            let chunk = job.chunk.as_str();
            let outcome = with_backoff(&label, opts.max_retries, opts.retry_backoff_ms, move || {
                summarizer.summarize(document, chunk)
            })
            .await;

            let result = match outcome {
                Ok(attempt) if attempt.value.context.trim().is_empty() => {
                    Err(EnrichError::EmptySummary { index: job.index })
                }
                Ok(attempt) => Ok(attempt.value),
                Err(detail) => Err(EnrichError::SummaryFailed {
                    index: job.index,
                    retries: opts.max_retries,
                    detail,
                }),
            };

            if let Some(cb) = progress {
                match &result {
                    Ok(_) => cb.on_chunk_enriched(job.index, total),
                    Err(e) => cb.on_chunk_error(job.index, total, e.to_string()),
                }
            }
            (job.index, result)
        })
        .buffer_unordered(opts.concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);

    for (index, result) in results {
        match result {
            Ok(summary) => {
                let chunk = &mut chunks[index];
                chunk.content = format!("{}\n\n{}", chunk.content, summary.context);
                chunk
                    .metadata
                    .insert(CONTEXT_KEY.into(), Value::String(summary.context));
                stats.usage += summary.usage;
                stats.enriched += 1;
                debug!("Chunk {index}: context appended");
            }
            Err(e) => {
                warn!("{e}");
                stats.failed += 1;
                stats.errors.push(e);
            }
        }
    }

    info!(
        "Enrichment done: {} enriched, {} failed, {} skipped; tokens in={} out={} cache_write={} cache_read={}",
        stats.enriched,
        stats.failed,
        stats.skipped,
        stats.usage.input_tokens,
        stats.usage.output_tokens,
        stats.usage.cache_creation_input_tokens,
        stats.usage.cache_read_input_tokens
    );

    (chunks, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const DOC: &str = "# Lejeloven\nforord\n### Kapitel 1: Område\n§ 1. Loven gælder.\n### Kapitel 2: Husleje\n§ 2. Lejen betales.";

    struct Echo;

    #[async_trait]
    impl ContextSummarizer for Echo {
        async fn summarize(&self, document: &str, _chunk: &str) -> Result<Summary, SummarizeError> {
            let first = document.lines().next().unwrap_or_default();
            Ok(Summary {
                context: format!("Fra {first}"),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 2,
                    ..Default::default()
                },
            })
        }
    }

    struct AlwaysFails {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContextSummarizer for AlwaysFails {
        async fn summarize(&self, _d: &str, _c: &str) -> Result<Summary, SummarizeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SummarizeError::new("quota exceeded"))
        }
    }

    fn opts() -> EnrichOptions {
        EnrichOptions {
            max_retries: 1,
            retry_backoff_ms: 1,
            concurrency: 4,
        }
    }

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("forord").with_meta("#", "Lejeloven"),
            Chunk::new("§ 1.").with_meta("###", "Kapitel 1: Område"),
            Chunk::new("§ 2.").with_meta("###", "Kapitel 2: Husleje"),
            Chunk::new("§ 9.").with_meta("###", "Kapitel 9: Findes ikke"),
        ]
    }

    #[test]
    fn sections_keep_their_heading() {
        let sections = chapter_sections(DOC);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, "Kapitel 1: Område");
        assert_eq!(sections[0].1, "### Kapitel 1: Område\n§ 1. Loven gælder.");
    }

    #[tokio::test]
    async fn appends_context_to_matching_chunks() {
        let (out, stats) = enrich_chunks(chunks(), DOC, Arc::new(Echo), opts(), None).await;

        assert_eq!(out[0].content, "forord");
        assert_eq!(
            out[1].content,
            "§ 1.\n\nFra ### Kapitel 1: Område"
        );
        assert_eq!(out[1].meta_str(CONTEXT_KEY), Some("Fra ### Kapitel 1: Område"));
        assert_eq!(out[2].meta_str(CONTEXT_KEY), Some("Fra ### Kapitel 2: Husleje"));
        assert!(out[3].meta_str(CONTEXT_KEY).is_none());

        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.enriched, 2);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.usage.input_tokens, 20);
    }

    #[tokio::test]
    async fn failures_leave_chunks_untouched() {
        let failing = Arc::new(AlwaysFails {
            calls: AtomicUsize::new(0),
        });
        let before = chunks();
        let (out, stats) =
            enrich_chunks(before.clone(), DOC, failing.clone(), opts(), None).await;

        assert_eq!(out, before);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.enriched, 0);
        assert!(matches!(stats.errors[0], EnrichError::SummaryFailed { index: 1, .. }));
        // One try plus one retry per candidate.
        assert_eq!(failing.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn empty_context_counts_as_failure() {
        struct Blank;
        #[async_trait]
        impl ContextSummarizer for Blank {
            async fn summarize(&self, _d: &str, _c: &str) -> Result<Summary, SummarizeError> {
                Ok(Summary::default())
            }
        }

        let (out, stats) = enrich_chunks(chunks(), DOC, Arc::new(Blank), opts(), None).await;
        assert_eq!(stats.failed, 2);
        assert!(out[1].meta_str(CONTEXT_KEY).is_none());
    }

    #[tokio::test]
    async fn progress_sees_every_candidate() {
        use crate::progress::ChunkingProgressCallback;

        #[derive(Default)]
        struct Seen(Mutex<Vec<usize>>);
        impl ChunkingProgressCallback for Seen {
            fn on_chunk_enriched(&self, index: usize, _total: usize) {
                self.0.lock().unwrap().push(index);
            }
        }

        let seen = Arc::new(Seen::default());
        let cb: ProgressCallback = seen.clone();
        enrich_chunks(chunks(), DOC, Arc::new(Echo), opts(), Some(&cb)).await;

        let mut indices = seen.0.lock().unwrap().clone();
        indices.sort_unstable();
        assert_eq!(indices, vec![1, 2]);
    }

    #[tokio::test]
    async fn no_chapters_means_nothing_to_do() {
        let (out, stats) =
            enrich_chunks(chunks(), "plain text", Arc::new(Echo), opts(), None).await;
        assert_eq!(out, chunks());
        assert_eq!(stats.candidates, 0);
        assert_eq!(stats.skipped, 4);
    }
}
