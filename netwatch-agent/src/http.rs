//! HTTP status API
//!
//! Routes:
//! - `GET  /health`                        liveness, always open
//! - `GET  /status/network`                latest reading per host
//! - `GET  /status/system`                 live resource snapshot and uptime
//! - `GET  /status/ip`                     public and private addresses
//! - `POST /alerts/drain`                  pending critical alerts, clears the queue
//! - `POST /reports`                       `{kind, date?}` on-demand report
//! - `GET  /thresholds`                    current threshold pairs
//! - `PUT  /thresholds/{metric}/{level}`   `{value}` validated update
//!
//! Every route except `/health` requires an `x-api-key` header matching the
//! configured key. Without a configured key those routes are refused.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::alerts::{Alert, ThresholdConfig, ThresholdPair};
use crate::ipinfo::IpConfig;
use crate::monitor::Monitor;
use crate::report::{ReportError, ReportOutcome};
use crate::status::{HostStatus, SystemStatus};

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub api_key: Option<Arc<str>>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, error: impl ToString) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    if req.uri().path().starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref() else {
        warn!("NETWATCH_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !ok {
        warn!("Rejected unauthenticated request to {}", req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status/network", get(network_status))
        .route("/status/system", get(system_status))
        .route("/status/ip", get(ip_status))
        .route("/alerts/drain", post(drain_alerts))
        .route("/reports", post(generate_report))
        .route("/thresholds", get(get_thresholds))
        .route("/thresholds/{metric}/{level}", put(set_threshold))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// GET /status/network
async fn network_status(State(app): State<AppState>) -> ApiResult<Vec<HostStatus>> {
    app.monitor.live_status().await.map(Json).map_err(|e| {
        error!("Network status query failed: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })
}

// GET /status/system
async fn system_status(State(app): State<AppState>) -> ApiResult<SystemStatus> {
    app.monitor.system_status().await.map(Json).map_err(|e| {
        error!("System status read failed: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })
}

// GET /status/ip
async fn ip_status(State(app): State<AppState>) -> Json<IpConfig> {
    Json(app.monitor.ip_config().await)
}

// POST /alerts/drain
async fn drain_alerts(State(app): State<AppState>) -> Json<Vec<Alert>> {
    Json(app.monitor.drain_alerts())
}

#[derive(Debug, Deserialize)]
struct ReportRequest {
    kind: String,
    date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum ReportResponse {
    Generated { path: String },
    NoData,
}

// POST /reports
async fn generate_report(State(app): State<AppState>, Json(req): Json<ReportRequest>) -> ApiResult<ReportResponse> {
    let monitor = app.monitor.clone();
    let result = tokio::task::spawn_blocking(move || monitor.generate_report(&req.kind, req.date.as_deref()))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    match result {
        Ok(ReportOutcome::Generated(path)) => Ok(Json(ReportResponse::Generated {
            path: path.display().to_string(),
        })),
        Ok(ReportOutcome::NoData) => Ok(Json(ReportResponse::NoData)),
        Err(ReportError::Window(e)) => Err(api_error(StatusCode::BAD_REQUEST, e)),
        Err(e) => {
            error!("On-demand report failed: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e))
        }
    }
}

// GET /thresholds
async fn get_thresholds(State(app): State<AppState>) -> Json<ThresholdConfig> {
    Json(app.monitor.thresholds())
}

#[derive(Debug, Deserialize)]
struct ThresholdUpdate {
    value: serde_json::Value,
}

// PUT /thresholds/{metric}/{level}
async fn set_threshold(
    State(app): State<AppState>,
    Path((metric, level)): Path<(String, String)>,
    Json(update): Json<ThresholdUpdate>,
) -> ApiResult<ThresholdPair> {
    // Numbers and numeric strings go through the same validation
    let raw = match update.value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    app.monitor
        .set_threshold(&metric, &level, &raw)
        .map(Json)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertQueue, ThresholdEvaluator};
    use crate::model::{now_local, Host, NetworkSample};
    use crate::purge::Purger;
    use crate::report::ReportService;
    use crate::store::Store;
    use crate::testkit::{FakeReader, RecordingRenderer};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use std::time::Duration;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    fn router(dir: &std::path::Path) -> (Router, Arc<Store>, Arc<ThresholdEvaluator>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let evaluator = Arc::new(ThresholdEvaluator::new(
            ThresholdConfig::default(),
            Arc::new(AlertQueue::new()),
        ));
        let reports = Arc::new(ReportService::new(
            store.clone(),
            Arc::new(RecordingRenderer::new(dir)),
            Arc::new(Purger::new(dir, Duration::from_secs(3600))),
        ));
        let monitor = Monitor::new(
            store.clone(),
            evaluator.clone(),
            Arc::new(FakeReader::new(Some(40.0), 10.0, 20.0, 30.0)),
            reports,
        );
        let app = build_router(AppState {
            monitor: Arc::new(monitor),
            api_key: Some(Arc::from(KEY)),
        });
        (app, store, evaluator)
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> HttpRequest<Body> {
        let builder = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header("x-api-key", KEY)
            .header("content-type", "application/json");
        match body {
            Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_open_and_status_requires_key() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _, _) = router(dir.path());

        let health = app
            .clone()
            .oneshot(HttpRequest::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let anonymous = app
            .clone()
            .oneshot(HttpRequest::get("/status/network").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let wrong = app
            .oneshot(
                HttpRequest::get("/status/network")
                    .header("x-api-key", "nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_network_status() {
        let dir = tempfile::tempdir().unwrap();
        let (app, store, _) = router(dir.path());
        store
            .append_network(&NetworkSample::down(now_local(), Host::LocalGateway))
            .unwrap();

        let response = app.oneshot(request("GET", "/status/network", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body[0]["state"], "unknown");
        assert_eq!(body[2]["host"], "Local Gateway");
        assert_eq!(body[2]["status"], "DOWN");
    }

    #[tokio::test]
    async fn test_drain_alerts_clears_queue() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _, evaluator) = router(dir.path());
        evaluator.evaluate(&crate::model::SystemSample {
            timestamp: now_local(),
            cpu_temp: Some(70.0),
            cpu_usage: 5.0,
            ram_usage: 10.0,
            storage_usage: 10.0,
        });

        let first = json_body(app.clone().oneshot(request("POST", "/alerts/drain", None)).await.unwrap()).await;
        assert_eq!(first.as_array().unwrap().len(), 1);
        let second = json_body(app.oneshot(request("POST", "/alerts/drain", None)).await.unwrap()).await;
        assert!(second.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reports_route() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _, _) = router(dir.path());

        let no_data = app
            .clone()
            .oneshot(request("POST", "/reports", Some(serde_json::json!({"kind": "today"}))))
            .await
            .unwrap();
        assert_eq!(no_data.status(), StatusCode::OK);
        assert_eq!(json_body(no_data).await["outcome"], "no_data");

        let bad = app
            .oneshot(request("POST", "/reports", Some(serde_json::json!({"kind": "custom"}))))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_threshold_updates() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _, evaluator) = router(dir.path());

        let ok = app
            .clone()
            .oneshot(request(
                "PUT",
                "/thresholds/storage_usage/critical",
                Some(serde_json::json!({"value": 95})),
            ))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(json_body(ok).await["critical"], 95.0);

        let rejected = app
            .oneshot(request(
                "PUT",
                "/thresholds/storage_usage/warning",
                Some(serde_json::json!({"value": "lots"})),
            ))
            .await
            .unwrap();
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
        assert_eq!(evaluator.thresholds().storage_usage, ThresholdPair::new(70.0, 95.0));
    }
}
