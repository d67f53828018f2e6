//! HTTP surface: the repository activity endpoint and a health probe.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::stats::RollingStats;
use crate::store::StoreError;
use crate::sync::{ActivityError, OwnerRepoRequest, PreconditionError, SyncOrchestrator};

/// Default upper bound on one activity request, sync included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: SyncOrchestrator,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(orchestrator: SyncOrchestrator) -> Self {
        Self {
            orchestrator,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Errors surfaced to HTTP callers as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("request did not complete within {0:?}")]
    Timeout(Duration),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Precondition(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<ActivityError> for ApiError {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::Precondition(e) => Self::Precondition(e),
            ActivityError::Store(e) => Self::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Activity request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/get_repo_activity/", post(get_repo_activity))
        .route("/get_repo_activity", post(get_repo_activity))
        .route("/health", get(health))
        .with_state(Arc::new(state))
}

/// Serve `router(state)` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn get_repo_activity(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OwnerRepoRequest>, JsonRejection>,
) -> Result<Json<RollingStats>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    tracing::info!(
        owners = ?request.owners,
        repos = ?request.repos,
        "Activity requested"
    );

    let report = tokio::time::timeout(
        state.request_timeout,
        state.orchestrator.run(&request, None),
    )
    .await
    .map_err(|_| ApiError::Timeout(state.request_timeout))??;

    if !report.failures.is_empty() {
        tracing::warn!(
            failed = report.failures.len(),
            synced = report.synced.len(),
            "Serving statistics after partial sync failure"
        );
    }

    Ok(Json(report.stats))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::source::fake::{FakeEventSource, raw_event};
    use crate::source::{EventPage, EventSource, Result as SourceResult};
    use crate::store::{EventStore, MemoryEventStore, Result as StoreResult};
    use crate::event::Event;

    fn app(source: Arc<dyn EventSource>, store: Arc<dyn EventStore>) -> Router {
        router(AppState::new(SyncOrchestrator::new(source, store)))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(
            Arc::new(FakeEventSource::new()),
            Arc::new(MemoryEventStore::new()),
        )
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn activity_returns_stats_keyed_by_group() {
        let created = (chrono::Utc::now() - chrono::Duration::minutes(1))
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        let source = Arc::new(FakeEventSource::new().with_pages(
            "mongodb",
            "mongo",
            vec![vec![raw_event(1, "PushEvent", &created, "mongodb", "mongo")]],
        ));

        let response = app(source, Arc::new(MemoryEventStore::new()))
            .oneshot(post_json(
                "/get_repo_activity/",
                json!({"owners": ["mongodb"], "repos": ["mongo"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "mean_repo": {"mongo": 0.0},
                "mean_type": {"PushEvent": 0.0},
                "mean_repo_type": {"mongo": {"PushEvent": 0.0}}
            })
        );
    }

    #[tokio::test]
    async fn too_many_pairs_is_bad_request() {
        let names: Vec<String> = (0..6).map(|i| format!("n{i}")).collect();
        let fake = Arc::new(FakeEventSource::new());

        let response = app(fake.clone(), Arc::new(MemoryEventStore::new()))
            .oneshot(post_json(
                "/get_repo_activity",
                json!({"owners": names, "repos": names}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("at most 5"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let response = app(
            Arc::new(FakeEventSource::new()),
            Arc::new(MemoryEventStore::new()),
        )
        .oneshot(post_json("/get_repo_activity/", json!({"owners": "mongodb"})))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    struct BrokenStore;

    #[async_trait]
    impl EventStore for BrokenStore {
        async fn count_by_repo(&self, _repo: &str) -> StoreResult<u64> {
            Err(sea_orm::DbErr::Custom("disk on fire".to_string()).into())
        }

        async fn event_ids(&self, _repo: &str) -> StoreResult<std::collections::HashSet<i64>> {
            Err(sea_orm::DbErr::Custom("disk on fire".to_string()).into())
        }

        async fn find_by_repos(&self, _repos: &[String]) -> StoreResult<Vec<Event>> {
            Err(sea_orm::DbErr::Custom("disk on fire".to_string()).into())
        }

        async fn insert_many(&self, _events: &[Event]) -> StoreResult<u64> {
            Err(sea_orm::DbErr::Custom("disk on fire".to_string()).into())
        }
    }

    #[tokio::test]
    async fn storage_failure_is_server_error() {
        let response = app(Arc::new(FakeEventSource::new()), Arc::new(BrokenStore))
            .oneshot(post_json(
                "/get_repo_activity/",
                json!({"owners": ["o"], "repos": ["r"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body_json(response).await["error"]
                .as_str()
                .unwrap()
                .contains("disk on fire")
        );
    }

    struct StalledSource;

    #[async_trait]
    impl EventSource for StalledSource {
        async fn fetch_page(&self, _owner: &str, _repo: &str, _page: u32) -> SourceResult<EventPage> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(EventPage::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_orchestration_times_out() {
        let state = AppState::new(SyncOrchestrator::new(
            Arc::new(StalledSource),
            Arc::new(MemoryEventStore::new()),
        ))
        .with_request_timeout(Duration::from_secs(5));

        let response = router(state)
            .oneshot(post_json(
                "/get_repo_activity/",
                json!({"owners": ["o"], "repos": ["r"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
