use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use index::{GraphStats, IndexError, IndexReport};
use ingest::Passage;
use query::GraphRagAnswer;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::error::ApiError;
use crate::metrics::{MetricsSnapshot, TimedOperation};
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ingest", post(ingest_text))
        .route("/query", post(run_query))
        .route("/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(state.clone(), track_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs each request in a span tagged with a fresh request id and counts the outcome
async fn track_request(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    state.metrics.record_request(response.status().is_success());

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn with_deadline<T>(deadline: Duration, work: impl Future<Output = Result<T, ApiError>>) -> Result<T, ApiError> {
    tokio::time::timeout(deadline, work)
        .await
        .map_err(|_| ApiError::Timeout(deadline))?
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub vector_store: String,
    pub graph_store: String,
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (vectors, graph) = tokio::join!(state.vectors.health(), state.graph.health());

    let status = if vectors.is_ok() && graph.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let describe = |result: Result<(), IndexError>| match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    (
        status,
        Json(HealthResponse {
            vector_store: describe(vectors),
            graph_store: describe(graph),
        }),
    )
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Raw text, one passage per non-blank line
    pub text: Option<String>,
    /// File or directory on the server
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub passages: usize,
    pub passages_indexed: usize,
    pub passages_skipped: usize,
    pub entities: usize,
    pub relations: usize,
    pub vectors_upserted: usize,
}

impl IngestResponse {
    fn new(passages: usize, report: &IndexReport) -> Self {
        Self {
            passages,
            passages_indexed: report.passages_indexed,
            passages_skipped: report.passages_skipped,
            entities: report.entities,
            relations: report.relations,
            vectors_upserted: report.vectors_upserted,
        }
    }
}

async fn ingest_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let passages = load_passages(&state, req).await?;
    if passages.is_empty() {
        return Err(ApiError::BadRequest("no passages found in input".into()));
    }

    let deadline = state.config.request_timeout();
    let response = with_deadline(deadline, async {
        let timer = TimedOperation::start();
        let extracted = extract::extract_passages(
            state.extractor.as_ref(),
            &passages,
            state.config.concurrency.max_concurrent_extractions,
        )
        .await?;
        let entities = extracted.iter().map(|p| p.extraction.entities.len()).sum();
        state.metrics.record_extract(timer.elapsed(), passages.len(), entities);

        // Graph merges and point ids are idempotent, so the whole batch can be retried
        let timer = TimedOperation::start();
        let report = state
            .retry
            .retry_if(
                "index_passages",
                || state.indexer.index_passages(&extracted),
                IndexError::is_retryable,
            )
            .await?;
        state.metrics.record_index(timer.elapsed());

        Ok(IngestResponse::new(passages.len(), &report))
    })
    .await?;

    info!(
        passages = response.passages,
        indexed = response.passages_indexed,
        entities = response.entities,
        relations = response.relations,
        "Ingest complete"
    );
    Ok(Json(response))
}

async fn load_passages(state: &AppState, req: IngestRequest) -> Result<Vec<Passage>, ApiError> {
    match (req.text, req.path) {
        (Some(text), None) => Ok(state.splitter.split(&text, "request")),
        (None, Some(path)) => {
            let path = PathBuf::from(path);
            if path.is_file() {
                Ok(ingest::ingest_file(&path, &state.splitter).await?)
            } else if path.is_dir() {
                Ok(ingest::ingest_directory(&path, &state.splitter).await?)
            } else {
                Err(ApiError::BadRequest(format!("path not found: {}", path.display())))
            }
        }
        _ => Err(ApiError::BadRequest("exactly one of `text` or `path` is required".into())),
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub collection: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(flatten)]
    pub result: GraphRagAnswer,
    pub cached: bool,
}

async fn run_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let limit = req.limit.unwrap_or(state.config.query.default_limit);
    let collection = req
        .collection
        .unwrap_or_else(|| state.config.qdrant.collection.clone());
    let timer = TimedOperation::start();

    let response = with_deadline(state.config.request_timeout(), async {
        let engine = &state.engine;
        let retrieval = state
            .retry
            .retry_if(
                "retrieve",
                || engine.retrieve(&collection, &req.query, limit),
                IndexError::is_retryable,
            )
            .await?;
        let context = engine.format(&retrieval);

        let cached_answer = if state.config.cache.enabled {
            state.cache.get_answer(&context, &req.query)
        } else {
            None
        };
        let cached = cached_answer.is_some();
        let answer = match cached_answer {
            Some(answer) => {
                state.metrics.record_answer_cache_hit();
                answer
            }
            None => {
                let answer = engine.generate(&context, &req.query).await?;
                if state.config.cache.enabled {
                    state.cache.set_answer(&context, &req.query, answer.clone());
                }
                answer
            }
        };

        Ok(QueryResponse {
            result: GraphRagAnswer {
                answer,
                context,
                ids: retrieval.ids,
                trace: retrieval.trace,
            },
            cached,
        })
    })
    .await?;

    state.metrics.record_query(timer.elapsed());
    info!(
        collection = %collection,
        seeds = response.result.ids.len(),
        cached = response.cached,
        elapsed_ms = timer.elapsed().as_millis() as u64,
        "Query answered"
    );
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub graph: GraphStats,
    pub cache: CacheStats,
    pub metrics: MetricsSnapshot,
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let graph = state.graph.stats().await?;

    Ok(Json(StatsResponse {
        graph,
        cache: state.cache.stats(),
        metrics: state.metrics.snapshot(),
    }))
}
