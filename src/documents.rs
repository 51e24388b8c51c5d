//! Extracted-document artifacts and page lookup.
//!
//! Each PDF becomes one JSON file `<stem>.json` holding its filename and the
//! plain text of every page.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// One page of an extracted document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

/// A source PDF with its extracted pages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Base filename of the PDF, e.g. `report-2021.pdf`
    pub filename: String,
    pub pages: Vec<Page>,
}

/// Points an indexed vector back at the page it was embedded from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRef {
    pub filename: String,
    pub page: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("io error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("page {page} not found in {filename}")]
    PageNotFound { filename: String, page: u32 },
}

/// Resolves the full text of an indexed page.
pub trait PageSource: Send + Sync {
    fn page_text(&self, filename: &str, page: u32) -> Result<String, DocumentError>;
}

impl Document {
    /// Metadata entries for every page, in page order.
    pub fn page_refs(&self) -> Vec<PageRef> {
        self.pages
            .iter()
            .map(|p| PageRef {
                filename: self.filename.clone(),
                page: p.page,
            })
            .collect()
    }

    pub fn page(&self, page: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page == page)
    }
}

/// Directory of extracted-document JSON files.
#[derive(Clone, Debug)]
pub struct ExtractedStore {
    dir: PathBuf,
}

impl ExtractedStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a PDF filename: the file stem with a `.json` extension.
    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        self.dir.join(format!("{stem}.json"))
    }

    /// Read a single artifact.
    pub fn read(&self, filename: &str) -> Result<Document, DocumentError> {
        Self::read_path(&self.artifact_path(filename))
    }

    /// Write a document artifact atomically.
    pub fn write(&self, document: &Document) -> Result<PathBuf, DocumentError> {
        let path = self.artifact_path(&document.filename);
        let json = serde_json::to_vec_pretty(document).map_err(|source| DocumentError::Json {
            path: path.clone(),
            source,
        })?;
        crate::storage::write_atomic(&path, &json).map_err(|source| DocumentError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Load every artifact in the directory, sorted by file name.
    pub fn load_all(&self) -> Result<Vec<Document>, DocumentError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| DocumentError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        paths.iter().map(|path| Self::read_path(path)).collect()
    }

    fn read_path(path: &Path) -> Result<Document, DocumentError> {
        let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| DocumentError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl PageSource for ExtractedStore {
    fn page_text(&self, filename: &str, page: u32) -> Result<String, DocumentError> {
        let document = self.read(filename)?;
        document
            .page(page)
            .map(|p| p.text.clone())
            .ok_or_else(|| DocumentError::PageNotFound {
                filename: filename.to_string(),
                page,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(filename: &str) -> Document {
        Document {
            filename: filename.to_string(),
            pages: vec![
                Page {
                    page: 1,
                    text: "First page.".to_string(),
                },
                Page {
                    page: 2,
                    text: "Second page.".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_artifact_path_uses_stem() {
        let store = ExtractedStore::new(PathBuf::from("/data/extracted"));
        assert_eq!(
            store.artifact_path("report.pdf"),
            PathBuf::from("/data/extracted/report.json")
        );
    }

    #[test]
    fn test_write_and_lookup_page() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtractedStore::new(dir.path().to_path_buf());
        store.write(&sample("report.pdf")).unwrap();

        assert_eq!(store.page_text("report.pdf", 2).unwrap(), "Second page.");
        assert!(matches!(
            store.page_text("report.pdf", 9),
            Err(DocumentError::PageNotFound { page: 9, .. })
        ));
        assert!(matches!(
            store.page_text("missing.pdf", 1),
            Err(DocumentError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{ not json").unwrap();
        let store = ExtractedStore::new(dir.path().to_path_buf());

        assert!(matches!(
            store.page_text("broken.pdf", 1),
            Err(DocumentError::Json { .. })
        ));
    }

    #[test]
    fn test_load_all_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtractedStore::new(dir.path().to_path_buf());
        store.write(&sample("b.pdf")).unwrap();
        store.write(&sample("a.pdf")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let docs = store.load_all().unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_artifact_json_shape() {
        let json = serde_json::to_value(sample("r.pdf")).unwrap();
        assert_eq!(json["filename"], "r.pdf");
        assert_eq!(json["pages"][0]["page"], 1);
        assert_eq!(json["pages"][0]["text"], "First page.");
    }

    #[test]
    fn test_page_refs() {
        let refs = sample("r.pdf").page_refs();
        assert_eq!(
            refs,
            vec![
                PageRef { filename: "r.pdf".into(), page: 1 },
                PageRef { filename: "r.pdf".into(), page: 2 },
            ]
        );
    }
}
