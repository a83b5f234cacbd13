use std::fmt;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::error::ApiError;
use super::{json_response, not_found_handler, panic_response};
use crate::core::{
    AllocationRequest, ForecastRequest, InsightsRequest, allocate, forecast, score, what_if_help,
};

/// The three calculator backends behind the gateway.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Budget,
    Savings,
    Insights,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Budget, ServiceKind::Savings, ServiceKind::Insights];

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Budget => "budget",
            ServiceKind::Savings => "savings",
            ServiceKind::Insights => "insights",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ServiceKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn default_port(self) -> u16 {
        match self {
            ServiceKind::Budget => 8001,
            ServiceKind::Savings => 8002,
            ServiceKind::Insights => 8003,
        }
    }

    pub fn default_url(self) -> String {
        format!("http://localhost:{}", self.default_port())
    }

    fn title(self) -> &'static str {
        match self {
            ServiceKind::Budget => "Budget Service",
            ServiceKind::Savings => "Savings Service",
            ServiceKind::Insights => "Insights Service",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct InfoResponse {
    message: String,
    version: &'static str,
}

/// Router for one calculator service.
pub fn service_router(kind: ServiceKind) -> Router {
    let router = Router::new()
        .route("/", get(move || async move { info_handler(kind) }))
        .route("/health", get(move || async move { health_handler(kind) }));

    let router = match kind {
        ServiceKind::Budget => router.route("/calculate", post(calculate_handler)),
        ServiceKind::Savings => router
            .route("/forecast", post(forecast_handler))
            .route("/what-if-help", get(what_if_help_handler)),
        ServiceKind::Insights => router.route("/analyze", post(analyze_handler)),
    };

    router
        .fallback(not_found_handler)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}

fn info_handler(kind: ServiceKind) -> Response {
    json_response(
        StatusCode::OK,
        InfoResponse {
            message: format!("{} API", kind.title()),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

fn health_handler(kind: ServiceKind) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            service: kind.name(),
        },
    )
}

async fn calculate_handler(
    payload: Result<Json<AllocationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let breakdown = allocate(request.amount, request.duration)?;
    info!(
        amount = %request.amount,
        duration = ?request.duration,
        total_savings = %breakdown.total_savings,
        "budget calculated"
    );
    Ok(json_response(StatusCode::OK, breakdown))
}

async fn forecast_handler(
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let result = forecast(
        request.monthly_savings,
        request.emergency_fund,
        request.current_goal,
    )?;
    info!(
        monthly_savings = %request.monthly_savings,
        progress = %result.emergency_fund_progress,
        "savings forecast calculated"
    );
    Ok(json_response(StatusCode::OK, result))
}

async fn what_if_help_handler() -> Response {
    json_response(StatusCode::OK, what_if_help())
}

async fn analyze_handler(
    payload: Result<Json<InsightsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let insights = score(&request.budget_breakdown, &request.savings_data)?;
    info!(
        health_score = %insights.health_score,
        status = ?insights.status,
        "insights generated"
    );
    Ok(json_response(StatusCode::OK, insights))
}
