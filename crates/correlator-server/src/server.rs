// crates/correlator-server/src/server.rs
// ============================================================================
// Module: Correlator HTTP Server
// Description: Axum router, handlers, and request limits for the correlator.
// Purpose: Serve OpenLineage batch ingestion and correlation queries.
// Dependencies: axum, correlator-core, correlator-config,
//               correlator-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! One router serves producers and readers. The ingestion handler drives the
//! core batch orchestrator and maps the envelope to HTTP dispositions
//! (200 all-success, 207 partial, 422 all-failed validation, 400 unusable
//! body). Query handlers compose reader calls into the API contract. Request
//! limits (body size, inflight concurrency, fixed-window rate limiting) sit
//! in front of every handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use correlator_config::CorrelatorConfig;
use correlator_core::BatchOrchestrator;
use correlator_core::BatchResponse;
use correlator_core::BatchStatus;
use correlator_core::CorrelationReader;
use correlator_core::IncidentFilter;
use correlator_core::IngestError;
use correlator_core::IngestErrorKind;
use correlator_core::JobRunId;
use correlator_core::LineageStore;
use correlator_core::Page;
use correlator_core::RunRecord;
use correlator_core::StoreError;
use correlator_core::UrnNormalizer;
use correlator_store_sqlite::SqliteLineageStore;
use correlator_store_sqlite::SqliteStoreConfig;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Semaphore;

use crate::config::ServerConfig;
use crate::contract::ErrorBody;
use crate::contract::HealthzResponse;
use crate::contract::IncidentDetailResponse;
use crate::contract::IncidentListResponse;
use crate::contract::IncidentSummary;
use crate::contract::IncidentsQuery;
use crate::contract::RecentIncidentsResponse;
use crate::contract::RecentQuery;
use crate::contract::RefreshResponse;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default incident page size.
const DEFAULT_PAGE_LIMIT: u32 = 50;
/// Maximum incident page size.
const MAX_PAGE_LIMIT: u32 = 500;
/// Maximum orchestration chain length walked for incident detail.
const MAX_ORCHESTRATION_HOPS: usize = 10;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server construction and serving errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration rejected.
    #[error("server config error: {0}")]
    Config(String),
    /// Initialization failed.
    #[error("server init error: {0}")]
    Init(String),
    /// Transport failure while serving.
    #[error("server transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Fixed-window rate limiter with in-memory buckets.
pub(crate) struct RateLimiter {
    /// Rate limit configuration.
    config: crate::config::RateLimitConfig,
    /// Per-key request buckets.
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
}

/// Rolling state for a single rate limit key.
struct RateLimitBucket {
    /// Window start time for the current bucket.
    window_start: Instant,
    /// Requests observed in the current window.
    count: u32,
    /// Last request timestamp for eviction.
    last_seen: Instant,
}

/// Decision returned by the rate limiter.
pub(crate) enum RateLimitDecision {
    /// Allow the request.
    Allow,
    /// Limit the request with a retry delay.
    Limited {
        /// Milliseconds before retrying the request.
        retry_after_ms: u64,
    },
    /// Reject because the limiter is over capacity.
    OverCapacity,
}

impl RateLimiter {
    /// Creates a new rate limiter from configuration.
    pub(crate) fn new(config: crate::config::RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Checks the limiter for the given key and updates the bucket.
    pub(crate) fn check(&self, key: &str) -> RateLimitDecision {
        let window = Duration::from_millis(self.config.window_ms);
        let ttl = Duration::from_millis(self.config.window_ms.saturating_mul(2));
        let now = Instant::now();
        let Ok(mut buckets) = self.buckets.lock() else {
            return RateLimitDecision::OverCapacity;
        };

        if buckets.len() > self.config.max_entries {
            buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) <= ttl);
        }
        if buckets.len() > self.config.max_entries {
            return RateLimitDecision::OverCapacity;
        }

        let bucket = buckets.entry(key.to_string()).or_insert(RateLimitBucket {
            window_start: now,
            count: 0,
            last_seen: now,
        });
        if now.duration_since(bucket.window_start) >= window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.last_seen = now;
        if bucket.count >= self.config.max_requests {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after_ms =
                u64::try_from(window.saturating_sub(elapsed).as_millis()).unwrap_or(u64::MAX);
            RateLimitDecision::Limited {
                retry_after_ms,
            }
        } else {
            bucket.count = bucket.count.saturating_add(1);
            RateLimitDecision::Allow
        }
    }
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared state for all handlers.
pub(crate) struct AppState {
    /// Immutable two-stage URN normalizer, built once at startup.
    normalizer: UrnNormalizer,
    /// SQLite-backed lineage store.
    store: SqliteLineageStore,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
    /// Refresh correlation views after successful batches.
    refresh_after_ingest: bool,
    /// Rate limiter for incoming requests.
    rate_limiter: Option<RateLimiter>,
    /// Concurrency limiter for inflight requests.
    inflight: Semaphore,
}

/// Correlator HTTP server.
pub struct CorrelatorServer {
    /// Validated bind address.
    addr: SocketAddr,
    /// Shared handler state.
    state: Arc<AppState>,
}

impl CorrelatorServer {
    /// Builds a server from configuration.
    ///
    /// Loads the identity configuration (degrading to empty), builds the
    /// immutable resolvers, and opens the store.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration validation or store
    /// initialization fails.
    pub fn from_config(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let identity = CorrelatorConfig::load(config.config_path.as_deref());
        let normalizer = identity.build_normalizer();
        let store = SqliteLineageStore::open(SqliteStoreConfig::new(&config.db_path))
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let rate_limiter = config.limits.rate_limit.clone().map(RateLimiter::new);
        let state = AppState {
            normalizer,
            store,
            max_body_bytes: config.max_body_bytes,
            refresh_after_ingest: config.refresh_after_ingest,
            rate_limiter,
            inflight: Semaphore::new(config.limits.max_inflight),
        };
        Ok(Self {
            addr,
            state: Arc::new(state),
        })
    }

    /// Returns the router serving every endpoint.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    /// Serves requests until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let app = build_router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|err| ServerError::Transport(format!("bind failed: {err}")))?;
        tracing::info!(bind = %self.addr, "correlator server listening");
        axum::serve(listener, app)
            .await
            .map_err(|err| ServerError::Transport(format!("serve failed: {err}")))
    }
}

/// Builds the axum router over the shared state.
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/lineage/events", post(ingest_events))
        .route("/api/v1/incidents", get(list_incidents))
        .route("/api/v1/incidents/recent", get(recent_incidents))
        .route("/api/v1/incidents/{id}", get(incident_detail))
        .route("/api/v1/runs/{job_run_id}", get(run_detail))
        .route("/api/v1/health/correlation", get(correlation_health))
        .route("/api/v1/views/refresh", post(refresh_views))
        .with_state(state)
}

// ============================================================================
// SECTION: Request Admission
// ============================================================================

/// Derives the rate limit key for a request.
fn rate_limit_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| "local".to_string(), |forwarded| forwarded.to_string())
}

/// Admits a request through the rate and concurrency limiters.
///
/// Returns an error response when the request must be rejected; the returned
/// permit must be held for the duration of the handler.
fn admit<'a>(
    state: &'a AppState,
    headers: &HeaderMap,
) -> Result<tokio::sync::SemaphorePermit<'a>, Response> {
    if let Some(limiter) = &state.rate_limiter {
        match limiter.check(&rate_limit_key(headers)) {
            RateLimitDecision::Allow => {}
            RateLimitDecision::Limited {
                retry_after_ms,
            } => {
                return Err(error_response(
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("rate limited; retry in {retry_after_ms} ms"),
                ));
            }
            RateLimitDecision::OverCapacity => {
                return Err(error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "rate limiter over capacity".to_string(),
                ));
            }
        }
    }
    state.inflight.try_acquire().map_err(|_| {
        error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "too many inflight requests".to_string(),
        )
    })
}

/// Builds a JSON error response.
fn error_response(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
        }),
    )
        .into_response()
}

/// Maps a reader error to a logged 500 response.
fn store_error_response(error: &StoreError) -> Response {
    tracing::error!(%error, "correlation query failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage query failed".to_string())
}

// ============================================================================
// SECTION: Ingestion Handler
// ============================================================================

/// Maps a batch envelope to its HTTP status code.
fn batch_status_code(response: &BatchResponse) -> StatusCode {
    match response.status {
        BatchStatus::Success => StatusCode::OK,
        BatchStatus::Partial => StatusCode::MULTI_STATUS,
        BatchStatus::Error => {
            if response.failures_all(IngestErrorKind::Validation) {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Handles `POST /api/v1/lineage/events`.
async fn ingest_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    if body.len() > state.max_body_bytes {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("body exceeds {} bytes", state.max_body_bytes),
        );
    }
    let events: Vec<Value> = match serde_json::from_slice(&body) {
        Ok(events) => events,
        Err(error) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("malformed batch body: {error}"),
            );
        }
    };
    let orchestrator = BatchOrchestrator::new(&state.normalizer, &state.store);
    let response = match orchestrator.ingest_batch(&events) {
        Ok(response) => response,
        Err(IngestError::Input(message)) => {
            return error_response(StatusCode::BAD_REQUEST, message);
        }
        Err(error) => {
            tracing::error!(%error, "batch orchestration failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "batch orchestration failed".to_string(),
            );
        }
    };
    if state.refresh_after_ingest && response.summary.successful > 0 {
        if let Err(error) = state.store.refresh_views() {
            tracing::warn!(%error, "post-ingest view refresh failed");
        }
    }
    (batch_status_code(&response), Json(response)).into_response()
}

// ============================================================================
// SECTION: Query Handlers
// ============================================================================

/// Handles `GET /api/v1/incidents`.
async fn list_incidents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<IncidentsQuery>,
) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    let executed_after = match &query.since {
        None => None,
        Some(since) => match OffsetDateTime::parse(since, &Rfc3339) {
            Ok(time) => Some(time),
            Err(error) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid since parameter: {error}"),
                );
            }
        },
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let filter = IncidentFilter {
        job_status: None,
        producer_name: query.producer.clone(),
        dataset_urn: query.dataset_urn.clone(),
        job_run_id: query.job_run_id.clone(),
        tool: query.tool.clone(),
        executed_after,
        executed_before: None,
    };
    let page = match state.store.incidents(
        &filter,
        Page {
            limit,
            offset,
        },
    ) {
        Ok(page) => page,
        Err(error) => return store_error_response(&error),
    };
    let job_run_ids: Vec<JobRunId> =
        page.incidents.iter().filter_map(|incident| incident.job_run_id.clone()).collect();
    let counts = match state.store.downstream_counts(&job_run_ids) {
        Ok(counts) => counts,
        Err(error) => return store_error_response(&error),
    };
    let orphan_count = match state.store.orphan_datasets() {
        Ok(orphans) => orphans.len() as u64,
        Err(error) => return store_error_response(&error),
    };
    let incidents = page
        .incidents
        .into_iter()
        .map(|incident| {
            let downstream_count = incident
                .job_run_id
                .as_ref()
                .and_then(|id| counts.get(id.as_str()).copied())
                .unwrap_or(0);
            IncidentSummary {
                incident,
                downstream_count,
            }
        })
        .collect();
    (
        StatusCode::OK,
        Json(IncidentListResponse {
            incidents,
            total: page.total,
            limit,
            offset,
            orphan_count,
        }),
    )
        .into_response()
}

/// Handles `GET /api/v1/incidents/{id}`.
async fn incident_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    let detail = match state.store.incident_by_id(id) {
        Ok(Some(detail)) => detail,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, format!("incident {id} not found"));
        }
        Err(error) => return store_error_response(&error),
    };
    let (test, dataset) = IncidentDetailResponse::bodies(&detail.incident);
    let mut job = None;
    let mut upstream = Vec::new();
    let mut downstream = Vec::new();
    let mut orchestration = Vec::new();
    if let Some(job_run_id) = &detail.incident.job_run_id {
        match state.store.run_detail(job_run_id) {
            Ok(Some(run_detail)) => job = Some(run_detail.run),
            Ok(None) => {}
            Err(error) => return store_error_response(&error),
        }
        match state.store.upstream_with_children(&detail.incident.dataset_urn, job_run_id, 0) {
            Ok(rows) => upstream = rows,
            Err(error) => return store_error_response(&error),
        }
        match state.store.downstream_with_parents(job_run_id, 0) {
            Ok(rows) => downstream = rows,
            Err(error) => return store_error_response(&error),
        }
        if let Some(run) = &job {
            orchestration = match orchestration_chain(&state, run) {
                Ok(chain) => chain,
                Err(error) => return store_error_response(&error),
            };
        }
    }
    (
        StatusCode::OK,
        Json(IncidentDetailResponse {
            test,
            dataset,
            job,
            upstream,
            downstream,
            correlation_status: detail.correlation_status,
            parent: detail.parent,
            orchestration,
        }),
    )
        .into_response()
}

/// Walks parent links upward and returns the chain root-first.
fn orchestration_chain(
    state: &AppState,
    leaf: &RunRecord,
) -> Result<Vec<RunRecord>, StoreError> {
    let mut chain = vec![leaf.clone()];
    let mut current_parent = leaf.parent_run_id.clone();
    while let Some(parent_id) = current_parent {
        if chain.len() >= MAX_ORCHESTRATION_HOPS {
            break;
        }
        let Some(parent_detail) = state.store.run_detail(&parent_id)? else {
            break;
        };
        current_parent = parent_detail.run.parent_run_id.clone();
        chain.push(parent_detail.run);
    }
    chain.reverse();
    Ok(chain)
}

/// Handles `GET /api/v1/incidents/recent`.
async fn recent_incidents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RecentQuery>,
) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    match state.store.recent_incidents(limit) {
        Ok(recent) => (
            StatusCode::OK,
            Json(RecentIncidentsResponse {
                recent,
            }),
        )
            .into_response(),
        Err(error) => store_error_response(&error),
    }
}

/// Handles `GET /api/v1/runs/{job_run_id}`.
async fn run_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(job_run_id): Path<String>,
) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    match state.store.run_detail(&JobRunId::new(job_run_id.clone())) {
        Ok(Some(detail)) => (StatusCode::OK, Json(detail)).into_response(),
        Ok(None) => {
            error_response(StatusCode::NOT_FOUND, format!("run {job_run_id} not found"))
        }
        Err(error) => store_error_response(&error),
    }
}

/// Handles `GET /api/v1/health/correlation`.
async fn correlation_health(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    match state.store.correlation_health() {
        Ok(health) => (StatusCode::OK, Json(health)).into_response(),
        Err(error) => store_error_response(&error),
    }
}

/// Handles `POST /api/v1/views/refresh`.
async fn refresh_views(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let _permit = match admit(&state, &headers) {
        Ok(permit) => permit,
        Err(response) => return response,
    };
    match state.store.refresh_views() {
        Ok(report) => (
            StatusCode::OK,
            Json(RefreshResponse {
                report,
            }),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "view refresh failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "view refresh failed".to_string())
        }
    }
}

/// Handles `GET /healthz`.
async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    match state.store.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthzResponse {
                status: "ok",
            }),
        )
            .into_response(),
        Err(error) => {
            tracing::error!(%error, "store ping failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthzResponse {
                    status: "unavailable",
                }),
            )
                .into_response()
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
