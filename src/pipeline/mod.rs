//! Pipeline stages for PDF-to-chunks conversion.
//!
//! Each submodule implements one transformation step and is testable on
//! its own. Everything after [`render`] is pure text processing.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ paginate ──▶ normalize ──▶ split ──▶ process ──▶ enrich
//! (%PDF)    (pdfium    (page        (Kapitel →    (headers  (7 passes)  (optional,
//!            or VLM)    markers)     ###)          + windows)             LLM)
//! ```
//!
//! 1. [`input`]     — validate the path or buffer as a PDF
//! 2. [`render`]    — text layer or vision transcription, pages joined by
//!    `-----` sentinels; pdfium runs in `spawn_blocking`
//! 3. [`paginate`]  — sentinels become numbered page markers
//! 4. [`normalize`] — chapter openings become `###` headings
//! 5. [`split`]     — header-aware split, then overlapping character windows
//! 6. [`process`]   — header prefix, page backfill, cleanup, ids, provenance
//! 7. [`enrich`]    — append an LLM-written context to each chapter chunk
//!
//! [`llm`] and [`vision`] hold the LLM plumbing shared by stages 2 and 7.

pub mod enrich;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod paginate;
pub mod process;
pub mod render;
pub mod split;
pub mod vision;
