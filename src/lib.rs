pub mod config;
pub mod context;
pub mod envelope;
pub mod extract;
pub mod logger;
pub mod middleware;
pub mod movie;
pub mod routes;
pub mod server;
pub mod util;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{body::Body, extract::Request, response::Response, Router};
use tower::ServiceExt;
use tracing::info;

use crate::config::{Config, Deployment};
use crate::logger::{SharedLogSink, TracingSink};
use crate::movie::{DoubanClient, MovieProvider, UpstreamError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Movie provider error: {0}")]
    Provider(#[from] UpstreamError),
    #[error("Server error: {0}")]
    Server(String),
}

/// Build the application state with the Douban client and `tracing` sink.
pub fn default_state(config: Config) -> Result<server::AppState, ServerError> {
    let movies: Arc<dyn MovieProvider> = Arc::new(DoubanClient::new(&config.douban)?);
    let logger: SharedLogSink = Arc::new(TracingSink);
    Ok(server::AppState::new(config, logger, movies))
}

/// The assembled pipeline as a plain value.
pub fn app(state: server::AppState) -> Router {
    server::build_router(state)
}

/// Invokes the pipeline one request at a time, for hosts that own the
/// network side.
#[derive(Clone)]
pub struct GatewayHandler {
    router: Router,
}

impl GatewayHandler {
    pub fn new(state: server::AppState) -> Self {
        Self { router: app(state) }
    }

    pub async fn call(&self, req: Request<Body>) -> Response {
        match self.router.clone().oneshot(req).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

pub async fn run(config: Config) -> Result<(), ServerError> {
    info!("Service: {}", config.service_name);
    info!("Movie provider: {}", config.douban.baseurl);
    if config.debug_logs {
        info!("Debug logging enabled");
    }

    let mode = config.mode;
    let address = config.listen.address.clone();
    let port = config.listen.port;
    let base_url = config.local_url();

    let state = default_state(config)?;
    let router = app(state);

    match mode {
        Deployment::HostManaged => {
            info!("Host-managed mode: handing the pipeline to the Lambda runtime");
            lambda_http::run(router)
                .await
                .map_err(|e| ServerError::Server(format!("Lambda runtime error: {}", e)))?;
        }
        Deployment::Standalone => {
            let addr = listen_addr(&address, port).await?;

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| ServerError::Server(format!("Failed to bind: {}", e)))?;

            info!("Movie gateway started: {}", base_url);
            info!("API docs: {}/docs", base_url);
            info!("Client demo: {}/demo", base_url);

            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Server(format!("Server error: {}", e)))?;
        }
    }

    Ok(())
}

/// Accepts IP literals (bare or bracketed IPv6 included) and host names.
async fn listen_addr(address: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let host = address.trim().trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ServerError::Server(format!("Invalid address {}: {}", address, e)))?
        .next()
        .ok_or_else(|| ServerError::Server(format!("Invalid address: {}", address)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
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
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listen_addr_accepts_ipv6_literals() {
        assert_eq!(
            listen_addr("::", 3000).await.unwrap(),
            "[::]:3000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            listen_addr("[::1]", 8080).await.unwrap(),
            "[::1]:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            listen_addr("0.0.0.0", 3000).await.unwrap(),
            "0.0.0.0:3000".parse::<SocketAddr>().unwrap()
        );
    }
}
