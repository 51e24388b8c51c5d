use crate::{
    config::Config,
    export::ExportDocument,
    semantic::{SearchResult, SearchService},
};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{fmt::Write as _, path::PathBuf, sync::Arc};
use tokio::signal;

/// Threshold prefilled in the search form when none is configured
const FORM_DEFAULT_THRESHOLD: f32 = 1.2;

#[derive(Clone)]
pub struct SharedState {
    service: Arc<SearchService>,
    top_k: usize,
    max_k: usize,
    distance_threshold: Option<f32>,
    dataset_dir: PathBuf,
}

impl SharedState {
    pub fn new(service: Arc<SearchService>, config: &Config) -> Self {
        Self {
            service,
            top_k: config.search.top_k,
            max_k: config.search.max_k,
            distance_threshold: config.search.distance_threshold,
            dataset_dir: config.dataset_dir(),
        }
    }

    fn clamp_k(&self, k: Option<usize>) -> usize {
        k.unwrap_or(self.top_k).clamp(1, self.max_k.max(1))
    }
}

pub fn router(state: SharedState) -> Router {
    let dataset = tower_http::services::ServeDir::new(&state.dataset_dir);

    Router::new()
        .route("/", get(index_page))
        .route("/api/search", post(search))
        .route("/api/export", post(export))
        .nest_service("/api/file", dataset)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(Arc::new(state))
}

async fn start_app(state: SharedState, addr: &str) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn start_daemon(state: SharedState, addr: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(state, addr))
}

#[derive(Debug, thiserror::Error)]
enum HttpError {
    #[error("{0}")]
    BadRequest(String),

    #[error("search task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

// Tell axum how to convert `HttpError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Join(_) | HttpError::Json(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub k: Option<usize>,
    pub threshold: Option<f32>,
}

/// Query string of the HTML form. Fields arrive as raw strings because an
/// empty form field is sent as `k=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchForm {
    pub q: Option<String>,
    pub k: Option<String>,
    pub threshold: Option<String>,
}

async fn run_query(
    state: &SharedState,
    query: String,
    k: Option<usize>,
    threshold: Option<f32>,
) -> Result<Vec<SearchResult>, HttpError> {
    if let Some(t) = threshold {
        if !t.is_finite() || t < 0.0 {
            return Err(HttpError::BadRequest(format!(
                "threshold must be a non-negative number, got {t}"
            )));
        }
    }

    let k = state.clamp_k(k);
    let threshold = threshold.or(state.distance_threshold);
    let service = state.service.clone();

    let results = tokio::task::spawn_blocking(move || service.query(&query, k, threshold)).await?;
    Ok(results)
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<SearchResult>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let results = run_query(&state, payload.query, payload.k, payload.threshold).await?;
    Ok(Json(results))
}

async fn export(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let query = payload.query.clone();
    let results = run_query(&state, payload.query, payload.k, payload.threshold).await?;
    let body = ExportDocument::new(&query, &results).to_json()?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"search_results.json\"",
            ),
        ],
        body,
    ))
}

async fn index_page(
    State(state): State<Arc<SharedState>>,
    Query(form): Query<SearchForm>,
) -> Result<Html<String>, HttpError> {
    let query = form.q.clone().unwrap_or_default();

    let k = parse_field::<usize>("k", form.k.as_deref())?;
    let threshold = match form.threshold.as_deref() {
        // field absent: configured threshold, else the form default
        None => state.distance_threshold.or(Some(FORM_DEFAULT_THRESHOLD)),
        Some(raw) => parse_field::<f32>("threshold", Some(raw))?,
    };

    let outcome = match form.q {
        None => Outcome::Idle,
        Some(q) if q.trim().is_empty() => Outcome::EmptyQuery,
        Some(q) => Outcome::Results(run_query(&state, q, k, threshold).await?),
    };

    Ok(Html(render_page(
        &query,
        state.clamp_k(k),
        threshold,
        &outcome,
    )))
}

fn parse_field<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, HttpError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| HttpError::BadRequest(format!("invalid {name}: {value}"))),
    }
}

enum Outcome {
    Idle,
    EmptyQuery,
    Results(Vec<SearchResult>),
}

fn render_page(query: &str, k: usize, threshold: Option<f32>, outcome: &Outcome) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<form method="get" action="/">
<input type="text" name="q" size="60" placeholder="e.g. weather conditions, visibility issues, crosswind on takeoff" value="{query}">
<label>Results <input type="number" name="k" min="1" value="{k}"></label>
<label>Threshold (lower = stricter) <input type="number" name="threshold" step="0.1" min="0" value="{threshold}"></label>
<button type="submit">Search</button>
</form>
"#,
        query = escape_html(query),
        threshold = threshold.map(|t| t.to_string()).unwrap_or_default(),
    );

    match outcome {
        Outcome::Idle => {}
        Outcome::EmptyQuery => {
            body.push_str("<p class=\"warning\">Please enter a query before searching.</p>\n");
        }
        Outcome::Results(results) if results.is_empty() => {
            body.push_str(
                "<p>No relevant results found for this query. Try different keywords.</p>\n",
            );
        }
        Outcome::Results(results) => {
            let _ = writeln!(body, "<h2>Results for: <b>{}</b></h2>", escape_html(query));
            for (i, res) in results.iter().enumerate() {
                let filename = escape_html(&res.metadata.filename);
                let _ = write!(
                    body,
                    r#"<div class="result">
<h3>{n}. {filename} &mdash; Page {page}</h3>
<p>Relevance Score: <code>{score:.4}</code></p>
<blockquote>{snippet}</blockquote>
<a href="{href}">Download PDF</a>
</div>
<hr>
"#,
                    n = i + 1,
                    page = res.metadata.page,
                    score = res.distance,
                    snippet = render_snippet(&res.snippet),
                    href = escape_html(&file_href(&res.metadata.filename)),
                );
            }
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>PDF Semantic Search</title>\n</head>\n<body>\n<h1>PDF Semantic Search</h1>\n{body}</body>\n</html>\n"
    )
}

/// Download URL of a dataset PDF, with the filename percent-encoded.
fn file_href(filename: &str) -> String {
    let Ok(mut url) = url::Url::parse("http://localhost/api/file/") else {
        return String::new();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(filename);
    }
    url.path().to_string()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a snippet and turn its `**word**` markers into `<mark>` tags.
fn render_snippet(snippet: &str) -> String {
    let escaped = escape_html(snippet);
    let parts: Vec<&str> = escaped.split("**").collect();
    let last = parts.len() - 1;

    let mut out = String::with_capacity(escaped.len());
    for (i, part) in parts.iter().enumerate() {
        if i % 2 == 0 {
            out.push_str(part);
        } else if i == last {
            // unbalanced marker, keep it literal
            out.push_str("**");
            out.push_str(part);
        } else {
            let _ = write!(out, "<mark>{part}</mark>");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_snippet() {
        assert_eq!(
            render_snippet("The **weather** was <bad>."),
            "The <mark>weather</mark> was &lt;bad&gt;."
        );
        assert_eq!(render_snippet("a ** b"), "a ** b");
        assert_eq!(render_snippet("plain"), "plain");
    }

    #[test]
    fn test_file_href_encodes_filename() {
        assert_eq!(file_href("report.pdf"), "/api/file/report.pdf");
        assert_eq!(
            file_href("annual report #2.pdf"),
            "/api/file/annual%20report%20%232.pdf"
        );
    }

    #[test]
    fn test_parse_field() {
        assert_eq!(parse_field::<usize>("k", None).unwrap(), None);
        assert_eq!(parse_field::<usize>("k", Some("")).unwrap(), None);
        assert_eq!(parse_field::<usize>("k", Some(" 3 ")).unwrap(), Some(3));
        assert!(parse_field::<usize>("k", Some("three")).is_err());
    }
}
