//! Gemini on Vertex AI.
//!
//! One `generateContent` call per document: the document as an inline part,
//! then the rendered prompt, with fixed sampling and safety settings.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sismica_core::{Document, DocumentModel, StaticTokenProvider};
//! use sismica_inference::gemini::{GeminiConfig, VertexGeminiBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = VertexGeminiBackend::new(
//!         GeminiConfig::new("my-project", "us-central1"),
//!         Arc::new(StaticTokenProvider::new("ya29.token")),
//!     )
//!     .unwrap();
//!     let doc = Document::new(std::fs::read("linea.pdf").unwrap(), "application/pdf");
//!     let text = backend
//!         .generate_from_document(&doc, "Extrae los campos", "gemini-2.5-flash")
//!         .await
//!         .unwrap();
//!     println!("{}", text);
//! }
//! ```

mod client;
mod types;

pub use client::{
    build_request, generation_config, safety_settings, GeminiConfig, VertexGeminiBackend,
};
pub use types::*;
