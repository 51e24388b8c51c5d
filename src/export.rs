use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::semantic::SearchResult;

/// Archived result set of one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub query: String,
    pub results: Vec<ExportEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub score: f32,
    pub filename: String,
    pub page: u32,
    pub snippet: String,
}

impl ExportDocument {
    pub fn new(query: &str, results: &[SearchResult]) -> Self {
        Self {
            query: query.to_string(),
            results: results
                .iter()
                .map(|r| ExportEntry {
                    score: r.distance,
                    filename: r.metadata.filename.clone(),
                    page: r.metadata.page,
                    snippet: r.snippet.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        crate::storage::write_atomic(path, self.to_json()?.as_bytes())?;
        log::info!("Results exported to {}", path.display());
        Ok(())
    }
}
