use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, Path, RawQuery, Request, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::services::ServiceKind;
use super::{json_response, not_found_handler, panic_response, with_cache_control};
use crate::advisor::{Advisor, ChatAdvisor, InsightsSource, advise_or_score};
use crate::config::{Environment, GatewayConfig};
use crate::core::{
    AllocationRequest, BudgetBreakdown, BudgetInsights, BudgetPeriod, DEFAULT_EMERGENCY_GOAL,
    ForecastRequest, SavingsForecast, ValidationError,
};
use crate::resilience::{RateLimiter, ServiceClient};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Everything the gateway handlers share. Built once at startup.
#[derive(Clone)]
pub struct GatewayState {
    clients: Arc<HashMap<ServiceKind, ServiceClient>>,
    rate_limiter: Arc<RateLimiter>,
    advisor: Option<Arc<dyn Advisor>>,
    environment: Environment,
    allowed_origins: Arc<[String]>,
}

impl GatewayState {
    pub fn new(clients: HashMap<ServiceKind, ServiceClient>, rate_limiter: RateLimiter) -> Self {
        Self {
            clients: Arc::new(clients),
            rate_limiter: Arc::new(rate_limiter),
            advisor: None,
            environment: Environment::Development,
            allowed_origins: Arc::from(Vec::new()),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let clients = ServiceKind::ALL
            .into_iter()
            .map(|kind| {
                let client = ServiceClient::new(kind.name(), config.service_url(kind))
                    .with_timeout(config.service_timeout())
                    .with_breaker(config.breaker())
                    .with_retry(config.retry());
                (kind, client)
            })
            .collect();
        let rate_limiter = RateLimiter::new(config.rate_limit_requests, config.rate_limit_window());

        let mut state = Self::new(clients, rate_limiter)
            .with_environment(config.environment, config.origins());

        match config.llm_api_key() {
            Some(key) => {
                let advisor = ChatAdvisor::new(key)
                    .with_base_url(config.llm_base_url.as_str())
                    .with_model(config.llm_model.as_str());
                info!(model = advisor.model(), "language-model advisor enabled");
                state = state.with_advisor(Arc::new(advisor));
            }
            None if config.environment.is_production() => {
                warn!("GROQ_API_KEY not set in production, insights use the rule-based scorer");
            }
            None => info!("no language-model key configured, insights use the rule-based scorer"),
        }
        state
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn Advisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_environment(mut self, environment: Environment, allowed_origins: Vec<String>) -> Self {
        self.environment = environment;
        self.allowed_origins = Arc::from(allowed_origins);
        self
    }

    fn client(&self, kind: ServiceKind) -> Result<&ServiceClient, ApiError> {
        self.clients
            .get(&kind)
            .ok_or_else(|| ApiError::UnknownService(kind.name().to_string()))
    }

    fn cors_layer(&self) -> CorsLayer {
        if !self.environment.is_production() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static(CORRELATION_ID_HEADER),
            ])
            .allow_credentials(true)
    }
}

/// Builds the gateway router. Environment differences come from `state`.
pub fn build_gateway(state: GatewayState) -> Router {
    let cors = state.cors_layer();
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route("/health", get(health_handler))
        .route("/api/plan", post(plan_handler))
        .route(
            "/api/:service/*path",
            get(proxy_handler)
                .post(proxy_handler)
                .put(proxy_handler)
                .delete(proxy_handler),
        )
        .fallback(not_found_handler)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), admission))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn index_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    with_cache_control(Html(
        INDEX_HTML.replace("{{title}}", state.environment.app_title()),
    ))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

#[derive(Debug, Serialize)]
struct ServiceHealth {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct GatewayHealth {
    status: &'static str,
    version: &'static str,
    timestamp: f64,
    services: BTreeMap<&'static str, ServiceHealth>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unhealthy_services: Vec<&'static str>,
}

async fn health_handler(State(state): State<GatewayState>) -> Response {
    let checks = ServiceKind::ALL.into_iter().filter_map(|kind| {
        let client = state.clients.get(&kind)?;
        Some(async move { (kind, client.health_check().await) })
    });
    let results = join_all(checks).await;

    let mut services = BTreeMap::new();
    let mut unhealthy_services = Vec::new();
    for (kind, healthy) in results {
        let status = if healthy { "healthy" } else { "unhealthy" };
        if !healthy {
            unhealthy_services.push(kind.name());
        }
        services.insert(kind.name(), ServiceHealth { status });
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    json_response(
        StatusCode::OK,
        GatewayHealth {
            status: if unhealthy_services.is_empty() {
                "healthy"
            } else {
                "degraded"
            },
            version: env!("CARGO_PKG_VERSION"),
            timestamp,
            services,
            unhealthy_services,
        },
    )
}

#[derive(Debug, Deserialize)]
struct PlanRequest {
    amount: Decimal,
    duration: BudgetPeriod,
    monthly_savings: Option<Decimal>,
    emergency_fund: Option<Decimal>,
    current_goal: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct PlanResponse {
    breakdown: BudgetBreakdown,
    forecast: SavingsForecast,
    insights: BudgetInsights,
    source: InsightsSource,
}

/// Allocation, forecast and insights for one income figure.
async fn plan_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let breakdown: BudgetBreakdown = state
        .client(ServiceKind::Budget)?
        .post_json(
            "calculate",
            &AllocationRequest {
                amount: request.amount,
                duration: request.duration,
            },
        )
        .await?;

    let monthly_savings = match request.monthly_savings {
        Some(monthly_savings) => monthly_savings,
        // allocation rounded savings down to nothing
        None if breakdown.total_savings <= Decimal::ZERO => {
            return Err(ValidationError::NoSavings { field: "amount" }.into());
        }
        None => breakdown.total_savings,
    };
    let forecast_request = ForecastRequest {
        monthly_savings,
        emergency_fund: request.emergency_fund.unwrap_or(Decimal::ZERO),
        current_goal: request.current_goal.unwrap_or(DEFAULT_EMERGENCY_GOAL),
    };
    let forecast: SavingsForecast = state
        .client(ServiceKind::Savings)?
        .post_json("forecast", &forecast_request)
        .await?;

    let (insights, source) =
        advise_or_score(state.advisor.as_deref(), &breakdown, &forecast).await?;
    info!(
        amount = %request.amount,
        health_score = %insights.health_score,
        source = ?source,
        "plan generated"
    );

    Ok(json_response(
        StatusCode::OK,
        PlanResponse {
            breakdown,
            forecast,
            insights,
            source,
        },
    ))
}

async fn proxy_handler(
    State(state): State<GatewayState>,
    Path((service, path)): Path<(String, String)>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    let kind = ServiceKind::from_name(&service).ok_or(ApiError::UnknownService(service))?;
    let client = state.client(kind)?;
    let body = (!body.is_empty()).then_some(body);

    let upstream = client.request(method, &path, query.as_deref(), body).await?;

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::OK);
    let mut response = (status, upstream.body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(with_cache_control(response))
}

/// Correlation id, rate limiting and the access log line for every request.
async fn admission(State(state): State<GatewayState>, mut request: Request, next: Next) -> Response {
    let started = tokio::time::Instant::now();
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    let client_id = client_identifier(
        request.headers(),
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    );
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = if state.rate_limiter.is_allowed(&client_id) {
        next.run(request).await
    } else {
        warn!(
            client = %client_id,
            %method,
            path = %path,
            correlation_id = %correlation_id,
            "suspicious activity: rate limit exceeded"
        );
        ApiError::RateLimited.into_response()
    };

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        client = %client_id,
        correlation_id = %correlation_id,
        "request completed"
    );
    response
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
