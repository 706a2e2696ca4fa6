//! Document storage backends.
//!
//! - [`GcsDocumentStore`]: Google Cloud Storage JSON API
//! - [`FilesystemDocumentStore`]: buckets as directories, for local runs
//! - [`MemoryDocumentStore`] (feature `mock`): in-memory, for tests

mod filesystem;
mod gcs;
#[cfg(any(test, feature = "mock"))]
mod memory;

pub use filesystem::FilesystemDocumentStore;
pub use gcs::{GcsConfig, GcsDocumentStore};
#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryDocumentStore;

use sismica_core::defaults;

/// MIME type implied by a file name's extension, if it is one we know.
pub fn content_type_for_extension(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())?;
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" | "tiff" => "image/tiff",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

/// Best-effort content type: extension first, then magic bytes.
pub fn detect_content_type(path: &str, data: &[u8]) -> String {
    if let Some(mime) = content_type_for_extension(path) {
        return mime.to_string();
    }
    infer::get(data)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| defaults::FALLBACK_CONTENT_TYPE.to_string())
}
