//! # sismica-inference
//!
//! Model-facing half of the extraction service.
//!
//! This crate provides:
//! - Reference lists (contractors, operators, processing types) read from CSV
//! - The extraction prompt builder
//! - A Vertex AI Gemini backend implementing [`DocumentModel`]
//! - A mock model (feature `mock`) for tests

pub mod gemini;
pub mod prompt;
pub mod reference;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use sismica_core::*;

pub use gemini::{GeminiConfig, VertexGeminiBackend};
pub use prompt::PromptBuilder;
pub use reference::{ReferenceList, ReferenceLists};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockDocumentModel;
