//! JSON persistence for chunks and documents.
//!
//! Output is UTF-8 with two-space indentation and non-ASCII kept literal, so
//! `æøå` and `§` survive as-is. Every persisted type goes through
//! [`ToRecord`]; there is no generic fallback.

use crate::chunk::Chunk;
use crate::error::LawChunkError;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conversion into a JSON object.
pub trait ToRecord {
    fn to_record(&self) -> Map<String, Value>;
}

impl ToRecord for Chunk {
    /// `{"content": ..., "metadata": {...}}`, metadata in insertion order.
    fn to_record(&self) -> Map<String, Value> {
        let metadata: Map<String, Value> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut record = Map::new();
        record.insert("content".into(), Value::String(self.content.clone()));
        record.insert("metadata".into(), Value::Object(metadata));
        record
    }
}

impl ToRecord for str {
    /// A bare document becomes `{"text": ...}`.
    fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("text".into(), Value::String(self.to_string()));
        record
    }
}

/// What can be written: a chunk list or a single document string.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Chunks(&'a [Chunk]),
    Text(&'a str),
}

impl<'a> From<&'a [Chunk]> for Payload<'a> {
    fn from(chunks: &'a [Chunk]) -> Self {
        Payload::Chunks(chunks)
    }
}

impl<'a> From<&'a Vec<Chunk>> for Payload<'a> {
    fn from(chunks: &'a Vec<Chunk>) -> Self {
        Payload::Chunks(chunks)
    }
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Payload::Text(text)
    }
}

impl Payload<'_> {
    fn to_value(self) -> Value {
        match self {
            Payload::Chunks(chunks) => Value::Array(
                chunks
                    .iter()
                    .map(|c| Value::Object(c.to_record()))
                    .collect(),
            ),
            Payload::Text(text) => Value::Object(text.to_record()),
        }
    }
}

/// Pretty-printed JSON for `payload`.
pub fn to_json<'a>(payload: impl Into<Payload<'a>>) -> Result<String, LawChunkError> {
    Ok(serde_json::to_string_pretty(&payload.into().to_value())?)
}

/// Write `payload` to `path` atomically, creating parent directories.
///
/// The JSON goes to a temp file in the same directory which is then renamed
/// over `path`, so readers never see a half-written file.
pub async fn write_json<'a>(
    payload: impl Into<Payload<'a>>,
    path: impl AsRef<Path>,
) -> Result<(), LawChunkError> {
    let json = to_json(payload)?;
    write_atomic(path.as_ref().to_path_buf(), json.into_bytes()).await
}

/// Write raw text (e.g. the prepared markdown) atomically.
pub async fn write_text(text: &str, path: impl AsRef<Path>) -> Result<(), LawChunkError> {
    write_atomic(path.as_ref().to_path_buf(), text.as_bytes().to_vec()).await
}

async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> Result<(), LawChunkError> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || {
        let fail = |source| LawChunkError::OutputWriteFailed {
            path: target.clone(),
            source,
        };
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(fail)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(fail)?;
        tmp.write_all(&bytes).map_err(fail)?;
        tmp.persist(&target).map_err(|e| fail(e.error))?;
        debug!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(())
    })
    .await
    .map_err(|e| LawChunkError::Internal(format!("Write task panicked: {e}")))?
}

/// Read a chunk file written by [`write_json`].
pub async fn read_chunks(path: impl AsRef<Path>) -> Result<Vec<Chunk>, LawChunkError> {
    let path = path.as_ref();
    let fail = |detail: String| LawChunkError::CacheReadFailed {
        path: path.to_path_buf(),
        detail,
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| fail(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| fail(e.to_string()))
}
