use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task;
use tracing::{error, info, warn};

use esg_kpi_core::{
    analyze_file, check_threshold, companies, company_profile, compare, dashboard, load_records,
    read_json, select_for_export, statistics, validate_batch, write_csv, AnalyticsConfig,
    Comparison, CompanyProfile, CorpusStatistics, Dashboard, EngineError, ExportSelection,
    FileAnalysis, GroupBy, KpiRecord, RadarMetric, RejectedRecord,
};

struct AppState {
    records: Arc<Vec<KpiRecord>>,
    config: AnalyticsConfig,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();
    let config = AnalyticsConfig::load(None)?;
    let records = match config.service.results.clone() {
        Some(path) => {
            let batch = task::spawn_blocking(move || load_records(&path)).await??;
            if !batch.is_clean() {
                warn!(rejected = batch.rejected.len(), "skipped invalid records");
            }
            batch.records
        }
        None => {
            warn!("no results configured; serving an empty corpus");
            Vec::new()
        }
    };
    let addr: SocketAddr = config
        .service
        .bind_addr
        .clone()
        .unwrap_or_else(|| "0.0.0.0:8000".to_string())
        .parse()?;
    let state = Arc::new(AppState {
        records: Arc::new(records),
        config,
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/statistics", get(handle_statistics))
        .route("/api/dashboard", get(handle_dashboard))
        .route("/api/companies", get(handle_companies))
        .route("/api/company/:name", get(handle_company))
        .route("/api/comparison", get(handle_comparison))
        .route("/api/analyze", post(handle_analyze))
        .route("/api/export/csv", get(handle_export))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    records: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ThresholdParams {
    min_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ComparisonParams {
    /// Comma separated source ids.
    companies: Option<String>,
    group_by: Option<String>,
    metric: Option<String>,
    min_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ExportParams {
    company: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    analysis: FileAnalysis,
    rejected: Vec<RejectedRecord>,
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        records: state.records.len(),
    })
}

async fn handle_statistics(State(state): State<Arc<AppState>>) -> Json<CorpusStatistics> {
    Json(statistics(&state.records))
}

async fn handle_companies(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(companies(&state.records))
}

async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ThresholdParams>,
) -> Result<Json<Dashboard>, AppError> {
    let min_confidence = resolve_threshold(&state, params.min_confidence)?;
    let records = Arc::clone(&state.records);
    let result = task::spawn_blocking(move || dashboard(&records, min_confidence))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(result))
}

async fn handle_company(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
    Query(params): Query<ThresholdParams>,
) -> Result<Json<CompanyProfile>, AppError> {
    let min_confidence = resolve_threshold(&state, params.min_confidence)?;
    company_profile(&state.records, &name, min_confidence)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no data for company {name}")))
}

async fn handle_comparison(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ComparisonParams>,
) -> Result<Json<Comparison>, AppError> {
    let min_confidence = resolve_threshold(&state, params.min_confidence)?;
    let selected = params
        .companies
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut ctx = state.config.filter_context().with_companies(selected);
    ctx.min_confidence = min_confidence;
    if let Some(raw) = params.group_by.as_deref() {
        ctx = ctx.with_group_by(
            GroupBy::from_str(raw)
                .ok_or_else(|| AppError::bad_request(format!("unknown group_by {raw}")))?,
        );
    }
    if let Some(raw) = params.metric.as_deref() {
        ctx = ctx.with_metric(
            RadarMetric::from_str(raw)
                .ok_or_else(|| AppError::bad_request(format!("unknown metric {raw}")))?,
        );
    }
    let records = Arc::clone(&state.records);
    let result = task::spawn_blocking(move || compare(&records, &ctx))
        .await
        .map_err(AppError::internal)??;
    Ok(Json(result))
}

/// Analyzes an uploaded extraction result without touching the loaded corpus.
async fn handle_analyze(body: Bytes) -> Result<Json<AnalyzeResponse>, AppError> {
    let result = task::spawn_blocking(move || -> Result<AnalyzeResponse, AppError> {
        let raws = read_json(body.as_ref())?;
        let batch = validate_batch(&raws);
        Ok(AnalyzeResponse {
            analysis: analyze_file(&batch.records),
            rejected: batch.rejected,
        })
    })
    .await
    .map_err(AppError::internal)??;
    Ok(Json(result))
}

async fn handle_export(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let selection = params
        .company
        .map_or(ExportSelection::All, ExportSelection::Company);
    let rows = select_for_export(&state.records, &selection);
    if rows.is_empty() {
        return Err(AppError::NotFound("no data to export".to_string()));
    }
    let mut buf = Vec::new();
    write_csv(&mut buf, &rows)?;
    let disposition = format!("attachment; filename=\"{}\"", selection.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buf,
    )
        .into_response())
}

fn resolve_threshold(state: &AppState, requested: Option<f64>) -> Result<f64, AppError> {
    Ok(check_threshold(
        requested.unwrap_or(state.config.analytics.min_confidence),
    )?)
}

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn bad_request<E: ToString>(msg: E) -> Self {
        Self::BadRequest(msg.to_string())
    }

    fn internal<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::Internal(err.into())
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(_)
            | EngineError::TooManySelections { .. }
            | EngineError::InvalidThreshold(_)
            | EngineError::SerdeJson(_) => AppError::bad_request(err),
            other => AppError::internal(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg })))
                    .into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": msg }))).into_response()
            }
            AppError::Internal(err) => {
                error!("internal_error" = %err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use esg_kpi_core::{validate, RawKpi};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        let records = [
            RawKpi::new("Scope 1 emissions", 120.0, 0.9)
                .source("acme")
                .topic("Climate"),
            RawKpi::new("Water use", 40.0, 0.7).source("acme").topic("Water"),
            RawKpi::new("Scope 1 emissions", 80.0, 0.8)
                .source("globex")
                .topic("Climate"),
            RawKpi::new("Waste", 3.0, 0.2).source("globex").topic("Waste"),
        ]
        .iter()
        .map(|raw| validate(raw).unwrap())
        .collect();
        Arc::new(AppState {
            records: Arc::new(records),
            config: AnalyticsConfig::default(),
        })
    }

    async fn call(req: Request<Body>) -> (StatusCode, Bytes) {
        let response = router(state()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body)
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let (status, body) = call(Request::get(uri).body(Body::empty()).unwrap()).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn dashboard_uses_configured_threshold_by_default() {
        let (status, body) = get_json("/api/dashboard").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["total_kpis"], 3);
        assert_eq!(body["benchmark"].as_array().unwrap().len(), 2);

        let (_, strict) = get_json("/api/dashboard?min_confidence=0.85").await;
        assert_eq!(strict["metrics"]["total_kpis"], 1);
    }

    #[tokio::test]
    async fn invalid_threshold_is_bad_request() {
        let (status, body) = get_json("/api/dashboard?min_confidence=4").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("4"));
    }

    #[tokio::test]
    async fn comparison_of_two_companies() {
        let (status, body) = get_json("/api/comparison?companies=acme,globex").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["radar"]["categories"].as_array().unwrap().len(), 2);
        assert_eq!(body["similarity"]["matrix"][0][0], 1.0);
    }

    #[tokio::test]
    async fn too_many_companies_is_rejected() {
        let (status, _) = get_json("/api/comparison?companies=a,b,c,d,e,f,g").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_company_is_not_found() {
        let (status, _) = get_json("/api/company/initech").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = get_json("/api/company/acme").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["kpi_count"], 2);
    }

    #[tokio::test]
    async fn analyze_reports_rejections() {
        let payload = r#"{"results": [
            {"kpi_name": "a", "value": 1.0, "confidence": 0.9},
            {"kpi_name": "b", "value": 2.0, "confidence": 1.5}
        ]}"#;
        let req = Request::post("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["analysis"]["summary"]["total_kpis"], 1);
        assert_eq!(body["rejected"][0]["index"], 1);
    }

    #[tokio::test]
    async fn export_is_csv_attachment() {
        let req = Request::get("/api/export/csv?company=globex")
            .body(Body::empty())
            .unwrap();
        let response = router(state()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"globex_kpis.csv\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 3);
    }
}
