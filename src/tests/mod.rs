
use crate::config::Config;
use crate::documents::{Document, ExtractedStore, Page};
use crate::semantic::{
    build_index, model_id_hash, Embedder, EmbeddingError, IndexStorage, SearchService,
};

/// Words the test embedder knows about, one vector component each.
const VOCABULARY: [&str; 5] = ["weather", "fog", "engine", "fuel", "runway"];

/// Deterministic embedder: component `i` is 1.0 when the text contains
/// `VOCABULARY[i]` as a word, 0.0 otherwise.
pub(crate) struct BagOfWords;

impl Embedder for BagOfWords {
    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }

    fn model_id(&self) -> [u8; 32] {
        model_id_hash("bag-of-words")
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .collect();

        Ok(VOCABULARY
            .iter()
            .map(|v| if words.iter().any(|w| w == v) { 1.0 } else { 0.0 })
            .collect())
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Accepts construction but fails every query.
pub(crate) struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dimensions(&self) -> usize {
        VOCABULARY.len()
    }

    fn model_id(&self) -> [u8; 32] {
        model_id_hash("broken")
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("model unavailable".into()))
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::EmbeddingFailed("model unavailable".into()))
    }
}

fn document(filename: &str, pages: &[&str]) -> Document {
    Document {
        filename: filename.to_string(),
        pages: pages
            .iter()
            .enumerate()
            .map(|(i, text)| Page {
                page: i as u32 + 1,
                text: text.to_string(),
            })
            .collect(),
    }
}

/// Two reports, three pages:
/// - `a.pdf` p1 mentions weather, fog and runway
/// - `a.pdf` p2 mentions the engine
/// - `b.pdf` p1 mentions fuel
pub(crate) fn sample_documents() -> Vec<Document> {
    vec![
        document(
            "a.pdf",
            &[
                "The weather was poor. Fog covered the runway.",
                "Engine failure shortly after takeoff.",
            ],
        ),
        document("b.pdf", &["Fuel exhaustion over the lake."]),
    ]
}

/// Extract, build and persist the sample corpus under a fresh base path.
pub(crate) fn indexed_workspace() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_base_path(dir.path().to_path_buf());

    let store = ExtractedStore::new(config.extracted_dir());
    for doc in sample_documents() {
        store.write(&doc).unwrap();
    }

    let documents = store.load_all().unwrap();
    let index = build_index(&BagOfWords, &documents).unwrap();
    IndexStorage::new(config.index_path(), config.metadata_path())
        .save(&index, &BagOfWords.model_id())
        .unwrap();

    (dir, config)
}

/// Load the persisted index of `config` into a service backed by `embedder`.
pub(crate) fn open_service(config: &Config, embedder: Box<dyn Embedder>) -> SearchService {
    let storage = IndexStorage::new(config.index_path(), config.metadata_path());
    let index = storage
        .load(&BagOfWords.model_id(), embedder.dimensions())
        .unwrap();
    let pages = ExtractedStore::new(config.extracted_dir());

    SearchService::new(embedder, index, Box::new(pages)).unwrap()
}
