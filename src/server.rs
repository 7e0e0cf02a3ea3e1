use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::alert::engine::{apply_alert_rules, evaluate_alerts, AlertEvent};
use crate::alert::sink::{AlertSink, StdoutSink, WebhookSink};
use crate::config::Config;
use crate::engine::allocation::{allocate_departments, department_detail, DepartmentDetail, DepartmentRow};
use crate::engine::counting::CountingMode;
use crate::engine::filter::{portfolio_overview, ElpFilter, PortfolioOverview};
use crate::engine::join::join_installs_with_costs;
use crate::engine::optimize::{
    low_usage_candidates, product_drilldown, reclaim_candidates, InstallDetail, ProductDrilldown,
};
use crate::engine::renewal::{build_renewal_schedule, RenewalFilter, RenewalRow};
use crate::engine::scenario::{plan_scenario, ScenarioPlan, ScenarioRequest};
use crate::engine::{elp_for_snapshot, enrich, ElpRow};
use crate::ingest::{cache, IngestError};
use crate::snapshot::PortfolioSnapshot;

#[derive(Clone)]
struct ApiState {
    config: Config,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::EmptyTable(_) => Self::bad_request(err.to_string()),
            other => Self::internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

/// Per-request overrides shared by every analytic endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
struct CommandContextRequest {
    data_dir: Option<String>,
    count_by_user: Option<bool>,
    today: Option<NaiveDate>,
}

struct EffectiveContext {
    snapshot: Arc<PortfolioSnapshot>,
    mode: CountingMode,
    today: NaiveDate,
}

fn resolve_effective_context(
    state: &ApiState,
    request: &CommandContextRequest,
) -> std::result::Result<EffectiveContext, ApiError> {
    let data_dir: PathBuf = request
        .data_dir
        .as_ref()
        .map(|d| crate::config::expand_tilde(d))
        .unwrap_or_else(|| state.config.resolved_data_dir());
    let snapshot = cache::load_cached(&data_dir, state.config.data.cache_ttl_secs)?;
    let mode = request
        .count_by_user
        .map(CountingMode::from_flag)
        .unwrap_or_else(|| state.config.counting_mode());
    let today = request.today.unwrap_or_else(|| Utc::now().date_naive());
    Ok(EffectiveContext {
        snapshot,
        mode,
        today,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ElpRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
    #[serde(flatten)]
    filter: ElpFilter,
}

#[derive(Debug, Clone, Deserialize)]
struct DrilldownRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
    software: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct OptimizationsRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RenewalsRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
    #[serde(flatten)]
    filter: RenewalFilter,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DepartmentsRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
    detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiScenarioRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
    #[serde(flatten)]
    scenario: ScenarioRequest,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AlertsRequest {
    #[serde(flatten)]
    context: CommandContextRequest,
    #[serde(default)]
    notify: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ElpResponse {
    overview: PortfolioOverview,
    rows: Vec<ElpRow>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct OptimizationsResponse {
    reclaim: Vec<InstallDetail>,
    low_usage: Vec<InstallDetail>,
}

#[derive(Debug, Serialize)]
struct RenewalsResponse {
    rows: Vec<RenewalRow>,
    digest: Option<String>,
}

#[derive(Debug, Serialize)]
struct DepartmentsResponse {
    rows: Vec<DepartmentRow>,
    detail: Option<DepartmentDetail>,
}

#[derive(Debug, Serialize)]
struct AlertsResponse {
    alerts: Vec<AlertEvent>,
    notified: bool,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let state = ApiState { config };
    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/elp", post(elp))
        .route("/v1/drilldown", post(drilldown))
        .route("/v1/optimizations", post(optimizations))
        .route("/v1/renewals", post(renewals))
        .route("/v1/departments", post(departments))
        .route("/v1/scenario", post(scenario))
        .route("/v1/alerts", post(alerts))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn elp(
    State(state): State<ApiState>,
    Json(request): Json<ElpRequest>,
) -> ApiResult<ElpResponse> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let rows = elp_for_snapshot(
        &effective.snapshot,
        effective.mode,
        effective.today,
        &state.config.analysis,
    );
    let rows = request.filter.apply(&rows);
    let overview = portfolio_overview(&rows);
    Ok(ok(ElpResponse {
        overview,
        rows,
        warnings: effective.snapshot.warnings.clone(),
    }))
}

async fn drilldown(
    State(state): State<ApiState>,
    Json(request): Json<DrilldownRequest>,
) -> ApiResult<ProductDrilldown> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let enriched = enrich(&effective.snapshot);
    let drilldown = product_drilldown(
        &effective.snapshot.licenses,
        &enriched,
        &request.software,
        effective.mode.policy(),
        effective.today,
        state.config.analysis.low_usage_days,
        effective.snapshot.capabilities.has_department,
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(ok(drilldown))
}

async fn optimizations(
    State(state): State<ApiState>,
    Json(request): Json<OptimizationsRequest>,
) -> ApiResult<OptimizationsResponse> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let enriched = enrich(&effective.snapshot);
    let has_department = effective.snapshot.capabilities.has_department;
    Ok(ok(OptimizationsResponse {
        reclaim: reclaim_candidates(&enriched, has_department),
        low_usage: low_usage_candidates(
            &enriched,
            effective.today,
            state.config.analysis.low_usage_days,
            has_department,
        ),
    }))
}

async fn renewals(
    State(state): State<ApiState>,
    Json(request): Json<RenewalsRequest>,
) -> ApiResult<RenewalsResponse> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let rows = build_renewal_schedule(
        &effective.snapshot.licenses,
        &effective.snapshot.vendors,
        effective.today,
        state.config.analysis.default_notice_days,
        state.config.analysis.renewal_window_days,
    );
    let rows = request.filter.apply(&rows);
    let digest = crate::engine::renewal::renewal_alert_digest(&rows);
    Ok(ok(RenewalsResponse { rows, digest }))
}

async fn departments(
    State(state): State<ApiState>,
    Json(request): Json<DepartmentsRequest>,
) -> ApiResult<DepartmentsResponse> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let enriched = enrich(&effective.snapshot);
    let costed = join_installs_with_costs(&enriched, &effective.snapshot.licenses);
    let rows = allocate_departments(&costed, &effective.snapshot.licenses, effective.mode.policy());
    let detail = request
        .detail
        .as_deref()
        .map(|dept| department_detail(&costed, dept, effective.mode.policy()));
    Ok(ok(DepartmentsResponse { rows, detail }))
}

async fn scenario(
    State(state): State<ApiState>,
    Json(request): Json<ApiScenarioRequest>,
) -> ApiResult<ScenarioPlan> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let enriched = enrich(&effective.snapshot);
    let plan = plan_scenario(
        &effective.snapshot.licenses,
        &enriched,
        &request.scenario,
        effective.mode.policy(),
        effective.snapshot.capabilities.has_department,
    )
    .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(ok(plan))
}

async fn alerts(
    State(state): State<ApiState>,
    Json(request): Json<AlertsRequest>,
) -> ApiResult<AlertsResponse> {
    let effective = resolve_effective_context(&state, &request.context)?;
    let rows = elp_for_snapshot(
        &effective.snapshot,
        effective.mode,
        effective.today,
        &state.config.analysis,
    );
    let events = apply_alert_rules(
        evaluate_alerts(&rows, &state.config.analysis),
        &state.config.alerts.rules,
    );

    let mut notified = false;
    if request.notify && !events.is_empty() {
        let mut sinks: Vec<Box<dyn AlertSink>> = Vec::new();
        if state.config.alerts.enable_stdout {
            sinks.push(Box::new(StdoutSink));
        }
        if !state.config.alerts.webhook_url.trim().is_empty() {
            sinks.push(Box::new(
                WebhookSink::new(state.config.alerts.webhook_url.clone())
                    .map_err(|e| ApiError::internal(e))?,
            ));
        }
        for event in &events {
            for sink in &sinks {
                if let Err(err) = sink.send(event).await {
                    warn!("failed sending alert: {err}");
                }
            }
        }
        notified = !sinks.is_empty();
    }

    Ok(ok(AlertsResponse {
        alerts: events,
        notified,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elp_request_flattens_context_and_filter() {
        let request: ElpRequest = serde_json::from_value(serde_json::json!({
            "count_by_user": true,
            "today": "2025-06-01",
            "subscriptions_only": true,
            "min_savings_usd": 100.0
        }))
        .unwrap();
        assert_eq!(request.context.count_by_user, Some(true));
        assert!(request.filter.subscriptions_only);
        assert_eq!(
            request.context.today,
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
    }

    #[test]
    fn scenario_request_defaults_to_excluding_terminated() {
        let request: ApiScenarioRequest = serde_json::from_value(serde_json::json!({
            "software": "Zoom Pro",
            "reduce_seats": 5
        }))
        .unwrap();
        assert!(request.scenario.exclude_terminated);
        assert_eq!(request.scenario.reduce_seats, 5);
    }
}
