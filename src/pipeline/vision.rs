//! Vision transcription: rasterised page → base64 PNG → VLM → clean markdown.
//!
//! Used only by [`crate::RenderMode::Vision`]. PNG keeps text edges crisp,
//! and `detail: "high"` lets GPT-4-class models read fine print such as
//! footnotes and subsection numbers.

use crate::config::ChunkingConfig;
use crate::error::LawChunkError;
use crate::pipeline::llm::{build_options, with_backoff};
use crate::prompts::PAGE_TRANSCRIPTION_PROMPT;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info};

/// Encode a rasterised page as a base64 PNG ready for the VLM API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image: {} bytes base64", b64.len());
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Transcribe one page, retrying transient failures.
///
/// `page` is 1-based and only used for logs and errors.
pub async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    page: usize,
    image: ImageData,
    options: &CompletionOptions,
    config: &ChunkingConfig,
) -> Result<String, LawChunkError> {
    let messages = vec![
        ChatMessage::system(PAGE_TRANSCRIPTION_PROMPT),
        ChatMessage::user_with_images("", vec![image]),
    ];
    let messages = &messages;
    let label = format!("Page {page}");

    let attempt = with_backoff(&label, config.max_retries, config.retry_backoff_ms, move || {
        provider.chat(messages, Some(options))
    })
    .await
    .map_err(|detail| LawChunkError::RenderFailed {
        page,
        detail: format!("transcription failed after {} retries: {detail}", config.max_retries),
    })?;

    let response = attempt.value;
    debug!(
        "Page {}: {} input tokens, {} output tokens, {} retries",
        page, response.prompt_tokens, response.completion_tokens, attempt.retries
    );
    Ok(clean_page_markdown(&response.content))
}

/// Transcribe every page concurrently; results come back in page order.
///
/// Any page that still fails after its retries fails the whole document.
pub async fn transcribe_pages(
    provider: &Arc<dyn LLMProvider>,
    images: Vec<DynamicImage>,
    config: &ChunkingConfig,
) -> Result<Vec<String>, LawChunkError> {
    let options = build_options(config);
    let total = images.len();
    info!("Transcribing {} pages (concurrency {})", total, config.concurrency);

    let mut pages: Vec<(usize, String)> = stream::iter(images.into_iter().enumerate())
        .map(|(idx, img)| {
            let options = &options;
            async move {
                let page = idx + 1;
                let data = encode_page(&img).map_err(|e| LawChunkError::RenderFailed {
                    page,
                    detail: format!("image encoding failed: {e}"),
                })?;
                let text = transcribe_page(provider, page, data, options, config).await?;
                Ok::<_, LawChunkError>((idx, text))
            }
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    pages.sort_by_key(|(idx, _)| *idx);
    Ok(pages.into_iter().map(|(_, text)| text).collect())
}

// ── Cleanup ──────────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\n(.*?)\n?```$").unwrap());

/// Deterministic cleanup of a transcribed page.
///
/// Strips an outer code fence (models add one despite the prompt), turns
/// CRLF into LF, removes invisible Unicode and trailing whitespace.
pub fn clean_page_markdown(input: &str) -> String {
    let trimmed = input.trim();
    let unfenced = RE_OUTER_FENCES
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    let normalised = unfenced.replace("\r\n", "\n").replace('\r', "\n");
    let visible = normalised.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    );

    visible
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn strips_outer_fence() {
        let raw = "```markdown\nKapitel 1\n\n_Område_\n```";
        assert_eq!(clean_page_markdown(raw), "Kapitel 1\n\n_Område_");
    }

    #[test]
    fn inner_fence_untouched() {
        let raw = "Tekst\n\n```\nkode\n```\n\nmere";
        assert_eq!(clean_page_markdown(raw), raw);
    }

    #[test]
    fn crlf_and_trailing_space() {
        assert_eq!(clean_page_markdown("a  \r\nb\t\r\n\r\n"), "a\nb");
    }

    #[test]
    fn invisible_chars_removed() {
        assert_eq!(clean_page_markdown("\u{FEFF}Lov\u{200B}en"), "Loven");
    }
}
