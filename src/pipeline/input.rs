//! Input resolution: turn a user-supplied path or byte buffer into CSV text.
//!
//! Spreadsheet exports routinely prepend a UTF-8 byte-order mark; if it were
//! left in place the first header would read `"\u{FEFF}이름"` and never match
//! the synonym table. Decoding is strict: a CSV saved as CP949/EUC-KR is
//! rejected with the offset of the first bad byte instead of being silently
//! turned into mojibake QR codes.

use crate::error::QrCardError;
use std::path::{Path, PathBuf};
use tracing::debug;

const UTF8_BOM: &str = "\u{FEFF}";

/// Read a local CSV file into text.
pub async fn read_input(path: impl AsRef<Path>) -> Result<String, QrCardError> {
    let path = path.as_ref().to_path_buf();

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(QrCardError::PermissionDenied { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(QrCardError::FileNotFound { path });
        }
        Err(e) => {
            return Err(QrCardError::Internal(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    decode_text(bytes)
}

/// Decode raw bytes as UTF-8, dropping a leading byte-order mark.
pub fn decode_text(bytes: Vec<u8>) -> Result<String, QrCardError> {
    let text = String::from_utf8(bytes).map_err(|e| QrCardError::InvalidUtf8 {
        offset: e.utf8_error().valid_up_to(),
    })?;
    Ok(strip_bom(&text).to_string())
}

/// Remove a leading UTF-8 byte-order mark, if any.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(UTF8_BOM).unwrap_or(text)
}

/// Check if the path has a `.csv` extension (case-insensitive).
pub fn is_csv_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Resolve `path` to an absolute path for log messages; falls back to the input.
pub fn display_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
