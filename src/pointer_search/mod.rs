//! Pointer Search Engine (SPEC_FULL §4.E).

pub mod engine;
pub mod types;

pub use engine::PointerSearchEngine;
pub use types::PointerResult;
