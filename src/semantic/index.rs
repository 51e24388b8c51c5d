//! In-memory flat vector index with exact L2 search.
//!
//! Vectors live in one contiguous buffer; the metadata sequence runs parallel
//! to it, so the n-th vector and the n-th metadata entry always describe the
//! same page.

use crate::documents::PageRef;

/// Flat (brute-force) vector index.
///
/// Append-only: positions are assigned in insertion order and never reused.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Row-major storage, `len() * dimensions` values
    vectors: Vec<f32>,
    /// Metadata for each stored vector, same order as `vectors`
    metadata: Vec<PageRef>,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// A single nearest-neighbor match.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Squared Euclidean distance to the query (smaller is closer)
    pub distance: f32,
    pub metadata: PageRef,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Got {vectors} vectors but {metadata} metadata entries")]
    LengthMismatch { vectors: usize, metadata: usize },
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: Vec::new(),
            metadata: Vec::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            vectors: Vec::with_capacity(dimensions * capacity),
            metadata: Vec::with_capacity(capacity),
            dimensions,
        }
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Metadata in position order.
    pub fn metadata(&self) -> &[PageRef] {
        &self.metadata
    }

    /// Vector stored at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        self.vectors.get(start..start + self.dimensions)
    }

    /// Iterate over `(vector, metadata)` pairs in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f32], &PageRef)> {
        self.vectors
            .chunks_exact(self.dimensions.max(1))
            .zip(self.metadata.iter())
    }

    /// Append vectors together with their metadata.
    ///
    /// Everything is validated before anything is stored, so a failed call
    /// leaves the index exactly as it was.
    pub fn add(&mut self, vectors: &[Vec<f32>], metadata: Vec<PageRef>) -> Result<(), IndexError> {
        if vectors.len() != metadata.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                metadata: metadata.len(),
            });
        }

        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: bad.len(),
            });
        }

        self.vectors.reserve(vectors.len() * self.dimensions);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.metadata.extend(metadata);

        log::debug!("Added {} vectors, index now holds {}", vectors.len(), self.len());

        Ok(())
    }

    /// Find the `k` stored vectors closest to `query`.
    ///
    /// Results are sorted by ascending distance; equal distances keep
    /// insertion order. Returns fewer than `k` hits when the index is smaller.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(vec![]);
        }

        let mut scored: Vec<(usize, f32)> = self
            .iter()
            .enumerate()
            .map(|(position, (vector, _))| (position, Self::squared_l2(query, vector)))
            .collect();

        // stable sort keeps first-inserted ahead on ties
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                distance,
                metadata: self.metadata[position].clone(),
            })
            .collect())
    }

    /// Squared Euclidean distance.
    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(filename: &str, page: u32) -> PageRef {
        PageRef {
            filename: filename.to_string(),
            page,
        }
    }

    #[test]
    fn test_new_index() {
        let index = VectorIndex::new(384);
        assert_eq!(index.dimensions(), 384);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_add_assigns_positions_in_order() {
        let mut index = VectorIndex::new(3);
        index
            .add(&[vec![1.0, 0.0, 0.0]], vec![page("a.pdf", 1)])
            .unwrap();
        index
            .add(
                &[vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
                vec![page("b.pdf", 1), page("b.pdf", 2)],
            )
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.metadata()[2], page("b.pdf", 2));
        assert_eq!(index.vector(1).unwrap(), &[0.0, 1.0, 0.0]);
        assert!(index.vector(3).is_none());
    }

    #[test]
    fn test_add_length_mismatch_leaves_index_untouched() {
        let mut index = VectorIndex::new(3);
        let result = index.add(
            &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
            vec![page("a.pdf", 1)],
        );

        assert!(matches!(
            result,
            Err(IndexError::LengthMismatch { vectors: 2, metadata: 1 })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_dimension_mismatch_leaves_index_untouched() {
        let mut index = VectorIndex::new(3);
        let result = index.add(
            &[vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0, 0.0]],
            vec![page("a.pdf", 1), page("a.pdf", 2)],
        );

        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
        assert!(index.is_empty());
        assert!(index.vector(0).is_none());
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::new(3);
        let results = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_query_dimension_mismatch() {
        let index = VectorIndex::new(3);
        let result = index.search(&[1.0, 0.0], 5);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![5.0, 0.0], vec![1.0, 0.0], vec![3.0, 0.0]],
                vec![page("a.pdf", 1), page("a.pdf", 2), page("a.pdf", 3)],
            )
            .unwrap();

        let results = index.search(&[0.0, 0.0], 3).unwrap();
        let pages: Vec<u32> = results.iter().map(|r| r.metadata.page).collect();
        assert_eq!(pages, vec![2, 3, 1]);

        // squared distances, not square-rooted
        assert_eq!(results[0].distance, 1.0);
        assert_eq!(results[1].distance, 9.0);
        assert_eq!(results[2].distance, 25.0);
    }

    #[test]
    fn test_search_with_limit() {
        let mut index = VectorIndex::new(2);
        let vectors: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32, 0.0]).collect();
        let metadata = (0..10).map(|i| page("a.pdf", i + 1)).collect();
        index.add(&vectors, metadata).unwrap();

        let results = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_search_fewer_than_k() {
        let mut index = VectorIndex::new(2);
        index
            .add(&[vec![1.0, 1.0], vec![2.0, 2.0]], vec![page("a.pdf", 1), page("a.pdf", 2)])
            .unwrap();

        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 2);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .add(
                &[vec![0.0, 1.0], vec![1.0, 0.0], vec![0.0, -1.0]],
                vec![page("a.pdf", 1), page("b.pdf", 1), page("c.pdf", 1)],
            )
            .unwrap();

        let results = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].metadata.filename, "a.pdf");
        assert_eq!(results[1].metadata.filename, "b.pdf");
    }
}
