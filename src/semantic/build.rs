//! Batch construction of the vector index from extracted documents.

use indicatif::{ProgressBar, ProgressStyle};

use crate::documents::Document;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::{IndexError, VectorIndex};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to embed {filename}: {source}")]
    Embedding {
        filename: String,
        #[source]
        source: EmbeddingError,
    },

    #[error("Failed to index {filename}: {source}")]
    Index {
        filename: String,
        #[source]
        source: IndexError,
    },
}

/// Embed every page of every document and collect them into one index.
///
/// Documents are added in the order given; within a document pages keep
/// their stored order. Each document's pages are embedded as one batch.
pub fn build_index(
    embedder: &dyn Embedder,
    documents: &[Document],
) -> Result<VectorIndex, BuildError> {
    let total_pages = documents.iter().map(|d| d.pages.len()).sum();
    let mut index = VectorIndex::with_capacity(embedder.dimensions(), total_pages);

    let progress = ProgressBar::new(total_pages as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} pages {msg}") {
        progress.set_style(style);
    }

    for document in documents {
        log::info!("Processing {}", document.filename);
        progress.set_message(document.filename.clone());

        let texts: Vec<String> = document.pages.iter().map(|p| p.text.clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .map_err(|source| BuildError::Embedding {
                filename: document.filename.clone(),
                source,
            })?;

        index
            .add(&embeddings, document.page_refs())
            .map_err(|source| BuildError::Index {
                filename: document.filename.clone(),
                source,
            })?;

        progress.inc(document.pages.len() as u64);
    }

    progress.finish_and_clear();
    log::info!(
        "Indexed {} pages from {} documents",
        index.len(),
        documents.len()
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Page, PageRef};

    /// Encodes text length into the first coordinate.
    struct LengthEmbedder;

    impl Embedder for LengthEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        fn model_id(&self) -> [u8; 32] {
            [1u8; 32]
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }
    }

    /// Returns one vector too few for any batch.
    struct ShortBatchEmbedder;

    impl Embedder for ShortBatchEmbedder {
        fn dimensions(&self) -> usize {
            2
        }

        fn model_id(&self) -> [u8; 32] {
            [2u8; 32]
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0, 0.0])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().skip(1).map(|_| vec![0.0, 0.0]).collect())
        }
    }

    fn doc(filename: &str, texts: &[&str]) -> Document {
        Document {
            filename: filename.to_string(),
            pages: texts
                .iter()
                .enumerate()
                .map(|(i, t)| Page {
                    page: i as u32 + 1,
                    text: t.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_build_preserves_document_and_page_order() {
        let docs = vec![doc("a.pdf", &["one", "three"]), doc("b.pdf", &["fives"])];
        let index = build_index(&LengthEmbedder, &docs).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(
            index.metadata(),
            &[
                PageRef { filename: "a.pdf".into(), page: 1 },
                PageRef { filename: "a.pdf".into(), page: 2 },
                PageRef { filename: "b.pdf".into(), page: 1 },
            ]
        );
        assert_eq!(index.vector(1).unwrap(), &[5.0, 1.0]);
    }

    #[test]
    fn test_build_empty_corpus() {
        let index = build_index(&LengthEmbedder, &[]).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dimensions(), 2);
    }

    #[test]
    fn test_short_batch_is_an_error() {
        let docs = vec![doc("a.pdf", &["one", "two"])];
        let result = build_index(&ShortBatchEmbedder, &docs);
        assert!(matches!(result, Err(BuildError::Index { .. })));
    }
}
