//! PDF rendering: turn every page into markdown-ish text, then join the
//! pages with the page-break sentinel the marker injector expects.
//!
//! pdfium wraps a C++ library with thread-local state, so every call into it
//! happens inside `tokio::task::spawn_blocking`.
//!
//! Two modes:
//! - **Text layer**: read the embedded text of each page. Fast and offline,
//!   but chapter titles lose their italics, so the header normalizer only
//!   fires when the PDF itself carries that structure.
//! - **Vision**: rasterise each page (longest edge capped by
//!   `max_rendered_pixels`) and have a VLM transcribe it.

use crate::config::{ChunkingConfig, RenderMode};
use crate::error::LawChunkError;
use crate::pipeline::paginate::PAGE_BREAK_SENTINEL;
use crate::pipeline::vision;
use edgequake_llm::LLMProvider;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming the directory that holds libpdfium.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Rendered document text plus its page count.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Pages joined by `"\n\n-----\n\n"`, with a sentinel after the last page too.
    pub markdown: String,
    pub page_count: usize,
}

/// Render `bytes` according to `config.render_mode`.
///
/// `label` names the document in errors. `provider` is required for
/// [`RenderMode::Vision`] and ignored otherwise.
pub async fn render_markdown(
    bytes: Vec<u8>,
    label: &Path,
    config: &ChunkingConfig,
    provider: Option<&Arc<dyn LLMProvider>>,
) -> Result<RenderedDocument, LawChunkError> {
    let pages = match config.render_mode {
        RenderMode::TextLayer => {
            let job = BlockingJob::new(bytes, label, config);
            run_blocking(move || job.extract_text()).await?
        }
        RenderMode::Vision => {
            let provider = provider.ok_or_else(|| LawChunkError::ProviderNotConfigured {
                provider: "vision".to_string(),
                hint: "Vision rendering needs an LLM provider. Use --provider/--model or set OPENAI_API_KEY.".to_string(),
            })?;
            let job = BlockingJob::new(bytes, label, config);
            let images = run_blocking(move || job.rasterise()).await?;
            vision::transcribe_pages(provider, images, config).await?
        }
    };

    info!("Rendered {} pages ({:?})", pages.len(), config.render_mode);
    Ok(RenderedDocument {
        page_count: pages.len(),
        markdown: assemble_pages(&pages),
    })
}

/// Join pages, writing the sentinel after every page including the last.
pub fn assemble_pages(pages: &[String]) -> String {
    let mut out = String::with_capacity(pages.iter().map(|p| p.len() + 9).sum());
    for page in pages {
        out.push_str(page);
        out.push_str("\n\n");
        out.push_str(PAGE_BREAK_SENTINEL);
        out.push_str("\n\n");
    }
    out
}

/// Tidy a page's text layer: LF line endings, no trailing whitespace.
pub fn clean_page_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// Bind to libpdfium: `lib_dir`, then `PDFIUM_LIB_PATH`, then the system loader.
pub fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, LawChunkError> {
    let dir = lib_dir
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));

    let bindings = match dir {
        Some(dir) => {
            debug!("Binding pdfium from {}", dir.display());
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| LawChunkError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

async fn run_blocking<T, F>(f: F) -> Result<T, LawChunkError>
where
    F: FnOnce() -> Result<T, LawChunkError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LawChunkError::Internal(format!("Render task panicked: {}", e)))?
}

/// Everything a blocking pdfium call needs, owned so it can cross threads.
struct BlockingJob {
    bytes: Vec<u8>,
    label: PathBuf,
    password: Option<String>,
    lib_dir: Option<PathBuf>,
    max_pixels: u32,
}

impl BlockingJob {
    fn new(bytes: Vec<u8>, label: &Path, config: &ChunkingConfig) -> Self {
        Self {
            bytes,
            label: label.to_path_buf(),
            password: config.password.clone(),
            lib_dir: config.pdfium_lib_path.clone(),
            max_pixels: config.max_rendered_pixels,
        }
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, LawChunkError>,
    ) -> Result<T, LawChunkError> {
        let pdfium = bind_pdfium(self.lib_dir.as_deref())?;
        let document = pdfium
            .load_pdf_from_byte_slice(&self.bytes, self.password.as_deref())
            .map_err(|e| self.load_error(e))?;
        f(&document)
    }

    fn load_error(&self, e: PdfiumError) -> LawChunkError {
        let err_str = format!("{:?}", e);
        let path = self.label.clone();
        if err_str.to_lowercase().contains("password") {
            if self.password.is_some() {
                LawChunkError::WrongPassword { path }
            } else {
                LawChunkError::PasswordRequired { path }
            }
        } else {
            LawChunkError::CorruptPdf {
                path,
                detail: err_str,
            }
        }
    }

    fn extract_text(&self) -> Result<Vec<String>, LawChunkError> {
        self.with_document(|document| {
            let mut pages = Vec::new();
            for (idx, page) in document.pages().iter().enumerate() {
                let text = page.text().map_err(|e| LawChunkError::RenderFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;
                let cleaned = clean_page_text(&text.all());
                debug!("Page {}: {} chars of text", idx + 1, cleaned.len());
                pages.push(cleaned);
            }
            Ok(pages)
        })
    }

    fn rasterise(&self) -> Result<Vec<DynamicImage>, LawChunkError> {
        let render_config = PdfRenderConfig::new()
            .set_target_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        self.with_document(|document| {
            let mut images = Vec::new();
            for (idx, page) in document.pages().iter().enumerate() {
                let bitmap = page.render_with_config(&render_config).map_err(|e| {
                    LawChunkError::RenderFailed {
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    }
                })?;
                let image = bitmap.as_image();
                debug!(
                    "Rasterised page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                images.push(image);
            }
            Ok(images)
        })
    }
}
