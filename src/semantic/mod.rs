//! Semantic search over extracted PDF pages.
//!
//! This module provides local semantic search using fastembed-rs for
//! generating embeddings and an exact in-memory vector index.
//!
//! # Architecture
//!
//! - `embeddings`: Wraps fastembed behind the `Embedder` trait
//! - `index`: Flat vector index with exact L2 search
//! - `storage`: Vector file + metadata file persistence
//! - `snippet`: Query-aware snippet extraction and highlighting
//! - `build`: Batch index construction from extracted documents
//! - `service`: Query orchestration (embed, search, filter, snippet)

mod build;
pub mod embeddings;
mod index;
pub mod snippet;
mod service;
mod storage;

pub use build::{build_index, BuildError};
pub use embeddings::{model_id_hash, Embedder, EmbeddingError, EmbeddingModel};
pub use index::{IndexError, SearchHit, VectorIndex};
pub use service::{SearchResult, SearchService, SearchServiceError, SNIPPET_UNAVAILABLE};
pub use storage::{IndexStorage, StorageError};

/// Default embedding model name (384 dimensions)
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
