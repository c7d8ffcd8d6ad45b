//! CLI binary for lawchunk.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ChunkingConfig`, runs `chunk_to_files` and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use lawchunk::{
    chunk_to_files, to_json, ChunkingConfig, ChunkingProgressCallback, PageMarker,
    ProgressCallback, RenderMode, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner for the coarse stages, switching to a bar while chunks are
/// enriched. Enrichment calls finish out of order, so the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Chunking");
        bar.set_message("opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ChunkingProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_enrichment_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Context");
        self.bar.reset_eta();
    }

    fn on_chunk_enriched(&self, _index: usize, _total: usize) {
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, index: usize, _total: usize, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error
        };
        self.bar
            .println(format!("  {} chunk {:>4}  {}", red("✗"), index, red(&msg)));
        self.bar.inc(1);
    }

    fn on_complete(&self, chunks: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} chunks", green("✔"), bold(&chunks.to_string()));
        } else {
            eprintln!(
                "{} {} chunks  ({} without context)",
                cyan("⚠"),
                bold(&chunks.to_string()),
                red(&failed.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Chunk a law into ./Lejeloven_chunks.json and ./Lejeloven.md
  lawchunk lejeloven.pdf --title Lejeloven

  # Write to another directory, smaller windows
  lawchunk lejeloven.pdf -o out --chunk-size 1000 --chunk-overlap 80

  # Transcribe pages with a vision model and add per-chunk context
  lawchunk scan.pdf --render vision --enrich --provider openai --model gpt-4.1-mini

  # Danish page markers
  lawchunk lov.pdf --page-marker "_Side {n} starter_"

  # Ignore an existing chunk file and rebuild it
  lawchunk lejeloven.pdf --force

OUTPUT:
  <output-dir>/<title>_chunks.json   JSON array of {"content", "metadata"}
  <output-dir>/<title>.md            the marked-up markdown the chunks came from

  A second run with the same title returns the existing chunk file unchanged.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (vision rendering, --enrich)
  ANTHROPIC_API_KEY       Anthropic API key
  LAWCHUNK_LLM_PROVIDER   Provider used when --provider is not given
  LAWCHUNK_MODEL          Model used when --model is not given
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Split legal PDFs into page-aware, header-aware chunks.
#[derive(Parser, Debug)]
#[command(
    name = "lawchunk",
    version,
    about = "Split legal PDFs into page-aware, header-aware chunks for retrieval",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path.
    input: PathBuf,

    /// Document title; names the output files. Default: the file stem.
    #[arg(short, long, env = "LAWCHUNK_TITLE")]
    title: Option<String>,

    /// Directory for the chunk and markdown files.
    #[arg(short, long, env = "LAWCHUNK_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// `source_name` written into every chunk. Default: the title.
    #[arg(long, env = "LAWCHUNK_SOURCE_NAME")]
    source_name: Option<String>,

    /// How pages become text: text (PDF text layer) or vision (LLM transcription).
    #[arg(long, env = "LAWCHUNK_RENDER", value_enum, default_value = "text")]
    render: RenderArg,

    /// Maximum characters per chunk.
    #[arg(long, env = "LAWCHUNK_CHUNK_SIZE", default_value_t = 1500)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks.
    #[arg(long, env = "LAWCHUNK_CHUNK_OVERLAP", default_value_t = 100)]
    chunk_overlap: usize,

    /// Deepest heading level that starts a new section (1–6).
    #[arg(long, env = "LAWCHUNK_HEADER_DEPTH", default_value_t = 3)]
    header_depth: usize,

    /// Page marker template; `{n}` is replaced by the page number.
    #[arg(long, env = "LAWCHUNK_PAGE_MARKER", default_value = lawchunk::config::DEFAULT_PAGE_MARKER)]
    page_marker: String,

    /// Append an LLM-written context to every chapter chunk.
    #[arg(long, env = "LAWCHUNK_ENRICH")]
    enrich: bool,

    /// Language the context is written in.
    #[arg(long, env = "LAWCHUNK_LANGUAGE", default_value = "Danish")]
    language: String,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini).
    #[arg(long, env = "LAWCHUNK_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "LAWCHUNK_LLM_PROVIDER")]
    provider: Option<String>,

    /// Concurrent LLM calls.
    #[arg(short, long, env = "LAWCHUNK_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Retries per LLM call.
    #[arg(long, env = "LAWCHUNK_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "LAWCHUNK_PASSWORD")]
    password: Option<String>,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Do not write the markdown file.
    #[arg(long, env = "LAWCHUNK_NO_MARKDOWN")]
    no_markdown: bool,

    /// Also print the chunks as JSON on stdout.
    #[arg(long, env = "LAWCHUNK_JSON")]
    json: bool,

    /// Rebuild even if the chunk file already exists.
    #[arg(short, long, env = "LAWCHUNK_FORCE")]
    force: bool,

    /// Disable progress bar.
    #[arg(long, env = "LAWCHUNK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LAWCHUNK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LAWCHUNK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum RenderArg {
    Text,
    Vision,
}

impl From<RenderArg> for RenderMode {
    fn from(v: RenderArg) -> Self {
        match v {
            RenderArg::Text => RenderMode::TextLayer,
            RenderArg::Vision => RenderMode::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ChunkingProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;

    let result = chunk_to_files(&cli.input, cli.title.as_deref(), &cli.output_dir, &config)
        .await
        .with_context(|| format!("Chunking {} failed", cli.input.display()))?;

    if cli.json {
        println!(
            "{}",
            to_json(&result.chunks).context("Failed to serialise chunks")?
        );
    }

    if !cli.quiet {
        if result.from_cache {
            eprintln!(
                "{} {} chunks from cache  →  {}",
                cyan("↺"),
                result.chunks.len(),
                bold(&result.chunk_file.display().to_string())
            );
            eprintln!("   {}", dim("use --force to rebuild"));
        } else {
            eprintln!(
                "{}  {} chunks  →  {}",
                green("✔"),
                result.chunks.len(),
                bold(&result.chunk_file.display().to_string())
            );
            if let Some(ref stats) = result.stats {
                eprintln!(
                    "   {}",
                    dim(&format!(
                        "{} pages, {} windows, {} dropped, {}ms",
                        stats.total_pages,
                        stats.raw_chunks,
                        stats.dropped_chunks,
                        stats.total_duration_ms
                    ))
                );
                if let Some(ref e) = stats.enrichment {
                    eprintln!(
                        "   {}",
                        dim(&format!(
                            "context: {} enriched, {} failed, {} skipped; {} tokens in / {} out",
                            e.enriched,
                            e.failed,
                            e.skipped,
                            e.usage.input_tokens,
                            e.usage.output_tokens
                        ))
                    );
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `ChunkingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ChunkingConfig> {
    let marker = PageMarker::new(&cli.page_marker).context("Invalid --page-marker")?;

    let mut builder = ChunkingConfig::builder()
        .render_mode(cli.render.clone().into())
        .page_marker(marker)
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .header_depth(cli.header_depth)
        .enrich_context(cli.enrich)
        .context_language(&cli.language)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .save_markdown(!cli.no_markdown)
        .refresh_cache(cli.force);

    if let Some(ref name) = cli.source_name {
        builder = builder.source_name(name);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref dir) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
