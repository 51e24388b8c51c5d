use std::path::Path;

use anyhow::{bail, Context};
use inquire::InquireError;

use crate::{
    cli::QueryArgs,
    config::Config,
    documents::ExtractedStore,
    export::ExportDocument,
    extract,
    semantic::{build_index, Embedder, EmbeddingModel, IndexStorage, SearchResult, SearchService},
};

/// Query parameters after applying configured defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    pub k: usize,
    pub threshold: Option<f32>,
}

impl QueryOptions {
    pub fn resolve(args: &QueryArgs, config: &Config) -> anyhow::Result<Self> {
        let k = args.k.unwrap_or(config.search.top_k);
        if k == 0 {
            bail!("number of results must be at least 1");
        }

        let threshold = args.threshold.or(config.search.distance_threshold);
        if let Some(threshold) = threshold {
            if !threshold.is_finite() || threshold < 0.0 {
                bail!("threshold must be a non-negative number, got {threshold}");
            }
        }

        Ok(Self { k, threshold })
    }
}

/// `extract`: PDFs -> extracted JSON artifacts.
pub fn run_extract(config: &Config, write_txt: bool) -> anyhow::Result<()> {
    let dataset_dir = config.dataset_dir();
    let store = ExtractedStore::new(config.extracted_dir());

    let written = extract::extract_dir(&dataset_dir, &store, write_txt)
        .with_context(|| format!("Failed to extract PDFs from {}", dataset_dir.display()))?;

    println!("{} documents extracted to {}", written, store.dir().display());
    Ok(())
}

/// `build`: extracted artifacts -> index pair.
pub fn run_build(config: &Config) -> anyhow::Result<()> {
    let store = ExtractedStore::new(config.extracted_dir());
    let documents = store.load_all().with_context(|| {
        format!(
            "Failed to read extracted documents from {}. Run `pdfsearch extract` first.",
            store.dir().display()
        )
    })?;

    if documents.is_empty() {
        bail!(
            "No extracted documents in {}. Run `pdfsearch extract` first.",
            store.dir().display()
        );
    }

    log::info!("Building index from {} extracted documents", documents.len());

    let model = EmbeddingModel::new(&config.search.model, config.model_cache_dir())?;
    log::info!("Embedding with {} ({} dimensions)", model.name(), model.dimensions());
    let index = build_index(&model, &documents)?;

    let storage = IndexStorage::new(config.index_path(), config.metadata_path());
    storage.save(&index, &model.model_id())?;

    println!(
        "Index built: {} pages from {} documents",
        index.len(),
        documents.len()
    );
    Ok(())
}

/// `search`: one query, printed or exported.
pub fn run_search(
    config: &Config,
    query: &str,
    options: QueryOptions,
    json: bool,
    export: Option<&Path>,
) -> anyhow::Result<()> {
    let service = SearchService::open(config)?;
    let results = service.query(query, options.k, options.threshold);

    if let Some(path) = export {
        ExportDocument::new(query, &results).write(path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }

    Ok(())
}

/// `repl`: interactive query loop.
///
/// The service is built once up front; a failure there ends the session.
/// Individual queries never end it.
pub fn run_repl(config: &Config, options: QueryOptions) -> anyhow::Result<()> {
    println!("\n===============================");
    println!("   PDF Semantic Search");
    println!("===============================\n");

    let service = SearchService::open(config)?;

    loop {
        let query = match inquire::Text::new("Enter your question (or type 'exit' to quit):").prompt() {
            Ok(query) => query,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => bail!("An error occurred: {}", err),
        };

        if query.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        if query.trim().is_empty() {
            println!("Please enter a query.");
            continue;
        }

        let results = service.query(&query, options.k, options.threshold);
        print_results(&results);
    }

    println!("Goodbye!");
    Ok(())
}

pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("\nNo relevant results found for this query. Try different keywords.");
        return;
    }

    println!("\n=== TOP RESULTS ===\n");
    println!("{}", format_results(results));
}

/// Human-readable listing of results, one block per hit.
pub fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, res)| {
            format!(
                "{}. {} (page {})\nScore: {:.4}\n> {}\n-----------------------------",
                i + 1,
                res.metadata.filename,
                res.metadata.page,
                res.distance,
                res.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
