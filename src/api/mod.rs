mod error;
mod gateway;
mod services;

pub use error::{ApiError, ErrorResponse};
pub use gateway::{CORRELATION_ID_HEADER, GatewayState, build_gateway};
pub use services::{ServiceKind, service_router};

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ConfigError, GatewayConfig};

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub async fn run_service(kind: ServiceKind, host: &str, port: u16) -> Result<(), ServeError> {
    let listener = TcpListener::bind((host, port)).await?;
    info!(
        service = kind.name(),
        addr = %listener.local_addr()?,
        "calculator service listening"
    );
    axum::serve(listener, service_router(kind)).await?;
    Ok(())
}

pub async fn run_gateway(config: GatewayConfig) -> Result<(), ServeError> {
    config.validate()?;
    let app = build_gateway(GatewayState::from_config(&config));

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        addr = %listener.local_addr()?,
        environment = ?config.environment,
        "gateway listening"
    );
    info!("Local access: http://127.0.0.1:{}/", config.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Runs every calculator service next to the gateway in one process. Each
/// service listens on the port of its configured URL.
pub async fn run_all(config: GatewayConfig) -> Result<(), ServeError> {
    config.validate()?;
    let mut ports = Vec::with_capacity(ServiceKind::ALL.len());
    for kind in ServiceKind::ALL {
        let url = config.service_url(kind);
        let port = reqwest::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.port_or_known_default())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("{kind} service URL '{url}' has no usable port"))
            })?;
        ports.push((kind, port));
    }

    let host = config.host.clone();
    let services = ports
        .into_iter()
        .map(|(kind, port)| {
            let host = host.clone();
            async move { run_service(kind, &host, port).await }
        })
        .collect::<Vec<_>>();

    tokio::try_join!(
        futures::future::try_join_all(services),
        run_gateway(config)
    )?;
    Ok(())
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

/// Answers a panicked handler with the generic 500 body.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("handler panicked");
    ApiError::Internal(detail.to_string()).into_response()
}

async fn not_found_handler() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        ErrorResponse {
            error: "Not found".to_string(),
            code: "not_found",
        },
    )
}
