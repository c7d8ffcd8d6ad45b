//! LLM prompts.
//!
//! Two prompts live here: the page transcription prompt used by
//! [`crate::RenderMode::Vision`], and the pair of messages that ask for a
//! chunk's situating context during enrichment.

/// System prompt for transcribing a rasterised page of a legal document.
///
/// The chapter rule matters downstream: the header normalizer recognises
/// `Kapitel N` followed by a blank line and an italic title.
pub const PAGE_TRANSCRIPTION_PROMPT: &str = r#"You are an expert transcriber of legal and regulatory documents. Convert the PDF page image to clean Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL text exactly, including section signs (§), paragraph numbers and numbered subsections
   - Keep the reading order a human would use
   - Do not translate, summarise or correct the wording

2. STRUCTURE
   - Use # for the document title and ## for parts or sections above chapter level
   - Write chapter openings exactly as two lines separated by a blank line:
     Kapitel <number>
     _<chapter title>_
   - Start each paragraph (§) on its own line
   - Use - for unordered lists and 1. 2. 3. for ordered lists

3. TABLES
   - Convert tables to GFM pipe format

4. WHAT TO IGNORE
   - Page numbers and running headers/footers
   - Decorative lines that carry no content

5. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary, page markers or horizontal rules of five dashes
   - Start directly with the page content"#;

/// Document message for enrichment: the whole chapter the chunk belongs to.
///
/// Sent as its own system message so providers with prompt caching can reuse
/// it across every chunk of the same chapter.
pub fn document_context(document: &str) -> String {
    format!("<document>\n{document}\n</document>")
}

/// User message for enrichment: the chunk plus the instruction.
pub fn chunk_context(chunk: &str, language: &str) -> String {
    format!(
        "Here is the chunk we want to situate within the whole document\n\
         <chunk>\n{chunk}\n</chunk>\n\n\
         Please give a short succinct context to situate this chunk within the overall \
         document for the purposes of improving search retrieval of the chunk. \
         The answer should be written in {language}. \
         Answer only with the succinct context and nothing else."
    )
}
