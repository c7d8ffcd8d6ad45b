//! Progress-callback trait for chunking events.
//!
//! Inject an [`Arc<dyn ChunkingProgressCallback>`] via
//! [`crate::config::ChunkingConfigBuilder::progress_callback`] to observe the
//! pipeline: coarse stage transitions for the whole document, then one event
//! per chunk while contextual summaries are generated.
//!
//! # Example
//!
//! ```rust
//! use lawchunk::{ChunkingConfig, ChunkingProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct StageCounter {
//!     stages: AtomicUsize,
//! }
//!
//! impl ChunkingProgressCallback for StageCounter {
//!     fn on_stage(&self, stage: Stage) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = ChunkingConfig::builder()
//!     .progress_callback(Arc::new(StageCounter { stages: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Coarse pipeline stages, reported in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Render,
    Prepare,
    Split,
    Process,
    Enrich,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Render => "rendering PDF",
            Stage::Prepare => "marking pages",
            Stage::Split => "splitting",
            Stage::Process => "post-processing chunks",
            Stage::Enrich => "appending context",
            Stage::Persist => "writing chunks",
        };
        f.write_str(name)
    }
}

/// Called by the pipeline as it works through a document.
///
/// Implementations must be `Send + Sync`: enrichment calls run concurrently,
/// so `on_chunk_enriched` and `on_chunk_error` may fire from different tasks
/// at once. All methods default to no-ops.
pub trait ChunkingProgressCallback: Send + Sync {
    /// A new stage is starting.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Enrichment is about to summarise `total` chunks.
    fn on_enrichment_start(&self, total: usize) {
        let _ = total;
    }

    /// The chunk at `index` (0-based in the final chunk list) received its context.
    fn on_chunk_enriched(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// The chunk at `index` was left without context after all retries.
    fn on_chunk_error(&self, index: usize, total: usize, error: String) {
        let _ = (index, total, error);
    }

    /// The document is done; `chunks` is the final chunk count.
    fn on_complete(&self, chunks: usize) {
        let _ = chunks;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ChunkingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ChunkingConfig`].
pub type ProgressCallback = Arc<dyn ChunkingProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        enriched: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ChunkingProgressCallback for Recorder {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_chunk_enriched(&self, _index: usize, _total: usize) {
            self.enriched.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _index: usize, _total: usize, _error: String) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::Render);
        cb.on_enrichment_start(3);
        cb.on_chunk_enriched(0, 3);
        cb.on_chunk_error(1, 3, "quota".into());
        cb.on_complete(3);
    }

    #[test]
    fn recorder_receives_events() {
        let rec = Recorder::default();
        rec.on_stage(Stage::Split);
        rec.on_stage(Stage::Process);
        rec.on_chunk_enriched(0, 2);
        rec.on_chunk_error(1, 2, "timeout".into());

        assert_eq!(*rec.stages.lock().unwrap(), vec![Stage::Split, Stage::Process]);
        assert_eq!(rec.enriched.load(Ordering::SeqCst), 1);
        assert_eq!(rec.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display_is_human_readable() {
        assert_eq!(Stage::Enrich.to_string(), "appending context");
    }

    #[tokio::test]
    async fn arc_dyn_callback_moves_into_task() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        tokio::spawn(async move {
            cb.on_chunk_error(0, 1, "boom".to_string());
        })
        .await
        .expect("spawn must succeed");
    }
}
