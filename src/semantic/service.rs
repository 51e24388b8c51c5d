//! Semantic search service over the indexed PDF pages.
//!
//! Wires the embedding model, the vector index and the page store into one
//! query operation:
//! - embeds the query and runs an exact k-NN search
//! - drops hits beyond an optional distance threshold
//! - attaches a highlighted snippet of each matching page
//!
//! Construction is eager: a service only exists once the model and both index
//! artifacts have loaded. Queries never fail; problems are logged and degrade
//! to fewer (or no) results.

use serde::Serialize;

use crate::config::Config;
use crate::documents::{ExtractedStore, PageRef, PageSource};
use crate::semantic::embeddings::{Embedder, EmbeddingError, EmbeddingModel};
use crate::semantic::index::VectorIndex;
use crate::semantic::snippet::{generate_snippet, DEFAULT_MAX_LENGTH};
use crate::semantic::storage::{IndexStorage, StorageError};

/// Snippet used when the page text of a hit cannot be read.
pub const SNIPPET_UNAVAILABLE: &str = "[Snippet unavailable]";

/// Errors raised while building a `SearchService`.
#[derive(Debug, thiserror::Error)]
pub enum SearchServiceError {
    #[error("Index artifact {} is missing. Run `pdfsearch build` first.", .0.display())]
    MissingIndex(std::path::PathBuf),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Index has {index} dimensions but the model produces {model}")]
    DimensionMismatch { index: usize, model: usize },
}

/// One ranked, enriched search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Squared L2 distance between query and page embedding
    pub distance: f32,
    pub metadata: PageRef,
    pub snippet: String,
}

/// Query-time search over a read-only index.
pub struct SearchService {
    embedder: Box<dyn Embedder>,
    index: VectorIndex,
    pages: Box<dyn PageSource>,
    snippet_max_length: usize,
}

impl SearchService {
    /// Assemble a service from already-initialized parts.
    pub fn new(
        embedder: Box<dyn Embedder>,
        index: VectorIndex,
        pages: Box<dyn PageSource>,
    ) -> Result<Self, SearchServiceError> {
        if embedder.dimensions() != index.dimensions() {
            return Err(SearchServiceError::DimensionMismatch {
                index: index.dimensions(),
                model: embedder.dimensions(),
            });
        }

        Ok(Self {
            embedder,
            index,
            pages,
            snippet_max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Maximum snippet length in characters.
    pub fn with_snippet_max_length(mut self, max_length: usize) -> Self {
        self.snippet_max_length = max_length;
        self
    }

    /// Load everything the configuration points at.
    ///
    /// Checks for the index artifacts before loading the model, so a missing
    /// build step is reported without waiting on a model download.
    pub fn open(config: &Config) -> Result<Self, SearchServiceError> {
        log::info!("Initializing search service");

        let storage = IndexStorage::new(config.index_path(), config.metadata_path());
        if let Some(missing) = storage.missing_artifact() {
            return Err(SearchServiceError::MissingIndex(missing.to_path_buf()));
        }

        let model = EmbeddingModel::new(&config.search.model, config.model_cache_dir())?;
        let index = storage.load(&model.model_id(), model.dimensions())?;
        let pages = ExtractedStore::new(config.extracted_dir());

        let service = Self::new(Box::new(model), index, Box::new(pages))?
            .with_snippet_max_length(config.search.snippet_max_length);

        log::info!("Search service ready ({} pages indexed)", service.indexed_count());

        Ok(service)
    }

    /// Number of indexed pages.
    pub fn indexed_count(&self) -> usize {
        self.index.len()
    }

    /// Search for pages similar to `query`.
    ///
    /// Returns at most `k` results ordered by ascending distance. When
    /// `distance_threshold` is set, hits with a larger distance are dropped.
    pub fn query(
        &self,
        query: &str,
        k: usize,
        distance_threshold: Option<f32>,
    ) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            log::warn!("Ignoring empty query");
            return vec![];
        }

        log::info!("Searching for: {}", query);

        let query_embedding = match self.embedder.embed(query) {
            Ok(embedding) => embedding,
            Err(e) => {
                log::warn!("Failed to embed query: {}", e);
                return vec![];
            }
        };

        let hits = match self.index.search(&query_embedding, k) {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("Index search failed: {}", e);
                return vec![];
            }
        };

        hits.into_iter()
            .filter(|hit| distance_threshold.map_or(true, |max| hit.distance <= max))
            .map(|hit| {
                let snippet = self.snippet_for(&hit.metadata, query);
                SearchResult {
                    distance: hit.distance,
                    metadata: hit.metadata,
                    snippet,
                }
            })
            .collect()
    }

    fn snippet_for(&self, page: &PageRef, query: &str) -> String {
        match self.pages.page_text(&page.filename, page.page) {
            Ok(text) => generate_snippet(&text, query, self.snippet_max_length),
            Err(e) => {
                log::warn!(
                    "No snippet for {} page {}: {}",
                    page.filename,
                    page.page,
                    e
                );
                SNIPPET_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentError;

    /// Embeds every text as the same constant vector.
    struct ConstantEmbedder(usize);

    impl Embedder for ConstantEmbedder {
        fn dimensions(&self) -> usize {
            self.0
        }

        fn model_id(&self) -> [u8; 32] {
            [0u8; 32]
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0; self.0])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.0; self.0]).collect())
        }
    }

    struct NoPages;

    impl PageSource for NoPages {
        fn page_text(&self, filename: &str, page: u32) -> Result<String, DocumentError> {
            Err(DocumentError::PageNotFound {
                filename: filename.to_string(),
                page,
            })
        }
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = SearchService::new(
            Box::new(ConstantEmbedder(4)),
            VectorIndex::new(3),
            Box::new(NoPages),
        );
        assert!(matches!(
            result,
            Err(SearchServiceError::DimensionMismatch { index: 3, model: 4 })
        ));
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let mut index = VectorIndex::new(2);
        index
            .add(&[vec![0.0, 0.0]], vec![PageRef { filename: "a.pdf".into(), page: 1 }])
            .unwrap();
        let service =
            SearchService::new(Box::new(ConstantEmbedder(2)), index, Box::new(NoPages)).unwrap();

        assert!(service.query("", 5, None).is_empty());
        assert!(service.query("   \t", 5, None).is_empty());
        assert_eq!(service.query("anything", 5, None).len(), 1);
    }

    #[test]
    fn test_missing_page_gets_placeholder() {
        let mut index = VectorIndex::new(2);
        index
            .add(&[vec![0.0, 0.0]], vec![PageRef { filename: "a.pdf".into(), page: 1 }])
            .unwrap();
        let service =
            SearchService::new(Box::new(ConstantEmbedder(2)), index, Box::new(NoPages)).unwrap();

        let results = service.query("weather", 1, None);
        assert_eq!(results[0].snippet, SNIPPET_UNAVAILABLE);
    }

    #[test]
    fn test_open_without_index_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_base_path(dir.path().to_path_buf());

        let result = SearchService::open(&config);
        assert!(matches!(result, Err(SearchServiceError::MissingIndex(_))));
    }
}
