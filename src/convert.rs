//! Chunking entry points.
//!
//! [`chunk_document`] and [`chunk_bytes`] run the whole pipeline in memory.
//! [`chunk_to_files`] adds the on-disk cache: a chunk file named after the
//! document title is returned as-is when it already exists.
//! [`chunk_text`] starts from already-rendered text and needs no pdfium.

use crate::chunk::Chunk;
use crate::config::{ChunkingConfig, PageMarker, RenderMode};
use crate::error::LawChunkError;
use crate::output::{ChunkingOutput, ChunkingStats, PersistedChunks};
use crate::pipeline::enrich::{self, ContextSummarizer, EnrichOptions, LlmSummarizer};
use crate::pipeline::process::{self, ProcessOptions};
use crate::pipeline::{input, normalize, paginate, render, split};
use crate::progress::Stage;
use crate::serialize;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Source name for in-memory documents with no configured name.
const UNNAMED_SOURCE: &str = "document";

/// Chunk a PDF file.
///
/// `source_name` defaults to the file stem.
///
/// # Errors
/// Fatal errors only: unreadable input, not a PDF, pdfium failures, a
/// needed LLM provider that cannot be built. Enrichment failures are
/// reported in `stats.enrichment` instead.
pub async fn chunk_document(
    input: impl AsRef<Path>,
    config: &ChunkingConfig,
) -> Result<ChunkingOutput, LawChunkError> {
    let path = input::resolve_input(input)?;
    info!("Chunking {}", path.display());
    let bytes = read_pdf(&path).await?;
    let source_name = config
        .source_name
        .clone()
        .unwrap_or_else(|| input::title_from_path(&path));
    run(bytes, &path, config, &source_name).await
}

/// Chunk a PDF held in memory.
///
/// # Example
/// ```rust,no_run
/// use lawchunk::{chunk_bytes, ChunkingConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("lejeloven.pdf")?;
/// let config = ChunkingConfig::builder().source_name("Lejeloven").build()?;
/// let output = chunk_bytes(&bytes, &config).await?;
/// println!("{} chunks", output.chunks.len());
/// # Ok(())
/// # }
/// ```
pub async fn chunk_bytes(
    bytes: &[u8],
    config: &ChunkingConfig,
) -> Result<ChunkingOutput, LawChunkError> {
    let label = PathBuf::from("<bytes>");
    input::check_pdf_bytes(bytes, &label)?;
    let source_name = config
        .source_name
        .clone()
        .unwrap_or_else(|| UNNAMED_SOURCE.to_string());
    run(bytes.to_vec(), &label, config, &source_name).await
}

/// Synchronous wrapper around [`chunk_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn chunk_sync(
    input: impl AsRef<Path>,
    config: &ChunkingConfig,
) -> Result<ChunkingOutput, LawChunkError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LawChunkError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(chunk_document(input, config))
}

/// Chunk a PDF and persist the result under `output_dir`.
///
/// Files are keyed by `title` (default: the file stem):
/// `<title>_chunks.json` and, unless disabled, `<title>.md`. When the chunk
/// file already exists it is read back and returned without rendering,
/// unless `config.refresh_cache` is set.
pub async fn chunk_to_files(
    input: impl AsRef<Path>,
    title: Option<&str>,
    output_dir: impl AsRef<Path>,
    config: &ChunkingConfig,
) -> Result<PersistedChunks, LawChunkError> {
    let input = input.as_ref();
    let title = title
        .map(str::to_string)
        .unwrap_or_else(|| input::title_from_path(input));
    let (chunk_file, markdown_file) = artifact_paths(output_dir.as_ref(), &title);

    if !config.refresh_cache && tokio::fs::try_exists(&chunk_file).await.unwrap_or(false) {
        info!("Using cached chunks from {}", chunk_file.display());
        let chunks = serialize::read_chunks(&chunk_file).await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_complete(chunks.len());
        }
        return Ok(PersistedChunks {
            chunks,
            chunk_file,
            markdown_file: None,
            from_cache: true,
            stats: None,
        });
    }

    let mut config = config.clone();
    if config.source_name.is_none() {
        config.source_name = Some(title);
    }
    let output = chunk_document(input, &config).await?;

    stage(&config, Stage::Persist);
    let markdown_file = if config.save_markdown {
        serialize::write_text(&output.markdown, &markdown_file).await?;
        Some(markdown_file)
    } else {
        None
    };
    serialize::write_json(&output.chunks, &chunk_file).await?;
    info!(
        "Wrote {} chunks to {}",
        output.chunks.len(),
        chunk_file.display()
    );

    Ok(PersistedChunks {
        chunks: output.chunks,
        chunk_file,
        markdown_file,
        from_cache: false,
        stats: Some(output.stats),
    })
}

/// `(<dir>/<title>_chunks.json, <dir>/<title>.md)`.
pub fn artifact_paths(output_dir: &Path, title: &str) -> (PathBuf, PathBuf) {
    (
        output_dir.join(format!("{title}_chunks.json")),
        output_dir.join(format!("{title}.md")),
    )
}

/// Chunk already-rendered text (pages separated by `-----` sentinels).
///
/// Runs every stage after rendering, enrichment included when configured.
pub async fn chunk_text(
    raw: &str,
    config: &ChunkingConfig,
    source_name: &str,
) -> Result<ChunkingOutput, LawChunkError> {
    let start = Instant::now();

    stage(config, Stage::Prepare);
    let markdown = prepare_markdown(raw, &config.page_marker);

    let (chunks, raw_chunks) = chunk_markdown(&markdown, config, source_name);

    let (chunks, enrichment) = if config.enrich_context {
        stage(config, Stage::Enrich);
        let summarizer: Arc<dyn ContextSummarizer> = match config.summarizer {
            Some(ref s) => Arc::clone(s),
            None => {
                let provider = resolve_provider(config).await?;
                Arc::new(LlmSummarizer::from_config(provider, config))
            }
        };
        let (chunks, stats) = enrich::enrich_chunks(
            chunks,
            &markdown,
            summarizer,
            EnrichOptions::from_config(config),
            config.progress_callback.as_ref(),
        )
        .await;
        (chunks, Some(stats))
    } else {
        (chunks, None)
    };

    let stats = ChunkingStats {
        total_pages: 0,
        raw_chunks,
        final_chunks: chunks.len(),
        dropped_chunks: raw_chunks - chunks.len(),
        enrichment,
        render_duration_ms: 0,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_complete(chunks.len());
    }

    Ok(ChunkingOutput {
        markdown,
        chunks,
        stats,
    })
}

/// Inject page markers, then normalise chapter headings.
pub fn prepare_markdown(raw: &str, marker: &PageMarker) -> String {
    normalize::normalize(&paginate::inject(raw, marker))
}

/// Split prepared markdown and post-process the windows.
///
/// Returns the final chunks and the number of windows the splitter made.
pub fn chunk_markdown(
    markdown: &str,
    config: &ChunkingConfig,
    source_name: &str,
) -> (Vec<Chunk>, usize) {
    stage(config, Stage::Split);
    let windows = split::split_markdown(
        markdown,
        config.header_depth,
        config.chunk_size,
        config.chunk_overlap,
    );
    let raw_count = windows.len();
    debug!("Splitter produced {} windows", raw_count);

    stage(config, Stage::Process);
    let opts = ProcessOptions::new(source_name).with_marker(config.page_marker.clone());
    (process::process(windows, &opts), raw_count)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    bytes: Vec<u8>,
    label: &Path,
    config: &ChunkingConfig,
    source_name: &str,
) -> Result<ChunkingOutput, LawChunkError> {
    let total_start = Instant::now();

    let provider = if config.render_mode == RenderMode::Vision {
        Some(resolve_provider(config).await?)
    } else {
        None
    };

    stage(config, Stage::Render);
    let render_start = Instant::now();
    let rendered = render::render_markdown(bytes, label, config, provider.as_ref()).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let mut output = chunk_text(&rendered.markdown, config, source_name).await?;
    output.stats.total_pages = rendered.page_count;
    output.stats.render_duration_ms = render_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Chunked {} pages into {} chunks ({} dropped) in {}ms",
        output.stats.total_pages,
        output.stats.final_chunks,
        output.stats.dropped_chunks,
        output.stats.total_duration_ms
    );
    Ok(output)
}

async fn read_pdf(path: &Path) -> Result<Vec<u8>, LawChunkError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => LawChunkError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => LawChunkError::FileNotFound {
            path: path.to_path_buf(),
        },
    })
}

fn stage(config: &ChunkingConfig, stage: Stage) {
    debug!("Stage: {stage}");
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, LawChunkError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        LawChunkError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` + `config.model`
/// 3. `LAWCHUNK_LLM_PROVIDER` + `LAWCHUNK_MODEL`, when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
pub async fn resolve_provider(
    config: &ChunkingConfig,
) -> Result<Arc<dyn LLMProvider>, LawChunkError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("LAWCHUNK_LLM_PROVIDER"),
        std::env::var("LAWCHUNK_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| LawChunkError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider/--model.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_title() {
        let (chunks, md) = artifact_paths(Path::new("/out"), "Lejeloven");
        assert_eq!(chunks, PathBuf::from("/out/Lejeloven_chunks.json"));
        assert_eq!(md, PathBuf::from("/out/Lejeloven.md"));
    }

    #[test]
    fn prepare_marks_pages_and_chapters() {
        let raw = "Kapitel 1\n\n_Område_\n\n§ 1.\n\n-----\n\n§ 2.\n\n-----\n\n";
        let md = prepare_markdown(raw, &PageMarker::default());
        assert!(md.starts_with("\n_Page 1 starts_\n### Kapitel 1: Område"));
        assert!(md.contains("\n_Page 2 starts_\n"));
        assert!(!md.contains("-----"));
    }

    #[test]
    fn chunk_markdown_counts_windows() {
        let config = ChunkingConfig::default();
        let md = prepare_markdown("§ 1. Tekst\n\n-----\n\n1\n\n-----\n\n", &config.page_marker);
        let (chunks, raw) = chunk_markdown(&md, &config, "Lov");
        assert_eq!(raw, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_numbers(), vec![1, 2]);
    }

    #[tokio::test]
    async fn chunk_bytes_rejects_non_pdf() {
        let err = chunk_bytes(b"not a pdf", &ChunkingConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LawChunkError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn chunk_text_without_enrichment() {
        let config = ChunkingConfig::default();
        let out = chunk_text("Kapitel 1\n\n_A_\n\n§ 1. Tekst\n\n-----\n\n", &config, "Lov")
            .await
            .unwrap();
        assert_eq!(out.chunks.len(), 1);
        assert!(out.stats.enrichment.is_none());
        assert_eq!(out.chunks[0].meta_str("###"), Some("Kapitel 1: A"));
    }
}
