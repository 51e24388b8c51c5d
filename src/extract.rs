//! PDF text extraction into extracted-document artifacts.

use std::path::{Path, PathBuf};

use crate::documents::{Document, DocumentError, ExtractedStore, Page};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Could not open PDF {}: {message}", path.display())]
    Pdf { path: PathBuf, message: String },

    #[cfg(not(feature = "pdf"))]
    #[error("PDF support not enabled. Compile with --features pdf")]
    Unsupported,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Collapse newlines to spaces and trim, as stored in the artifacts.
pub fn clean_page_text(raw: &str) -> String {
    raw.trim().replace(['\r', '\n'], " ")
}

/// Build a document from already-extracted page texts.
pub fn document_from_pages(filename: &str, pages: Vec<String>) -> Document {
    Document {
        filename: filename.to_string(),
        pages: pages
            .iter()
            .enumerate()
            .map(|(i, text)| Page {
                page: i as u32 + 1,
                text: clean_page_text(text),
            })
            .collect(),
    }
}

/// Extract the text of every page of a PDF.
#[cfg(feature = "pdf")]
pub fn extract_pdf(path: &Path) -> Result<Document, ExtractError> {
    log::info!("Opening PDF: {}", path.display());

    let pages = guard_pdf(path, || pdf_extract::extract_text_by_pages(path))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(document_from_pages(&filename, pages))
}

/// Run a PDF parser call, turning both its errors and its panics into
/// `ExtractError::Pdf` for `path`.
///
/// The parser panics on some malformed fonts and encodings.
fn guard_pdf<T, E: std::fmt::Display>(
    path: &Path,
    parse: impl FnOnce() -> Result<T, E> + std::panic::UnwindSafe,
) -> Result<T, ExtractError> {
    let pdf_error = |message: String| ExtractError::Pdf {
        path: path.to_path_buf(),
        message,
    };

    match std::panic::catch_unwind(parse) {
        Ok(result) => result.map_err(|e| pdf_error(e.to_string())),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".to_string());
            Err(pdf_error(format!("parser panicked: {reason}")))
        }
    }
}

#[cfg(not(feature = "pdf"))]
pub fn extract_pdf(_path: &Path) -> Result<Document, ExtractError> {
    Err(ExtractError::Unsupported)
}

/// Plain-text rendering of a document, one `--- Page N ---` section per page.
pub fn render_text(document: &Document) -> String {
    let mut out = String::new();
    for page in &document.pages {
        out.push_str(&format!("--- Page {} ---\n", page.page));
        out.push_str(&page.text);
        out.push_str("\n\n");
    }
    out
}

/// Extract every PDF in `dataset_dir` into `store`.
///
/// PDFs that cannot be read are logged and skipped. Returns the number of
/// documents written.
pub fn extract_dir(
    dataset_dir: &Path,
    store: &ExtractedStore,
    write_txt: bool,
) -> Result<usize, ExtractError> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dataset_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();

    if pdfs.is_empty() {
        log::warn!("No PDF files found in {}", dataset_dir.display());
    }

    let mut written = 0;
    for pdf in &pdfs {
        let document = match extract_pdf(pdf) {
            Ok(document) => document,
            #[cfg(not(feature = "pdf"))]
            Err(ExtractError::Unsupported) => return Err(ExtractError::Unsupported),
            Err(e) => {
                log::error!("{}", e);
                continue;
            }
        };

        let json_path = store.write(&document)?;
        log::info!("JSON saved to {}", json_path.display());

        if write_txt {
            let txt_path = json_path.with_extension("txt");
            crate::storage::write_atomic(&txt_path, render_text(&document).as_bytes())?;
            log::info!("Text file saved to {}", txt_path.display());
        }

        written += 1;
    }

    Ok(written)
}
