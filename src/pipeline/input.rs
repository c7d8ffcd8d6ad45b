//! Input resolution: validate a user-supplied path (or buffer) as a PDF.
//!
//! We check the `%PDF` magic bytes up front so callers get a meaningful
//! error instead of a pdfium parse failure deep inside the renderer.

use crate::error::LawChunkError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<PathBuf, LawChunkError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(LawChunkError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(LawChunkError::PermissionDenied { path });
        }
        Err(_) => return Err(LawChunkError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != PDF_MAGIC {
        return Err(LawChunkError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Validate an in-memory buffer. `label` names it in error messages.
pub fn check_pdf_bytes(bytes: &[u8], label: &Path) -> Result<(), LawChunkError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(LawChunkError::NotAPdf {
        path: label.to_path_buf(),
        magic,
    })
}

/// Default document title for a path: the file stem.
pub fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}
