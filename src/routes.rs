use axum::{
    extract::{OriginalUri, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::context::request_origin;
use crate::envelope::Envelope;
use crate::server::AppState;

pub const DOCS_PAGE: &str = "/api-docs.html";
pub const DEMO_PAGE: &str = "/client-demo.html";

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<&'static [&'static str]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub docs: String,
    pub demo: String,
    pub endpoints: Vec<EndpointInfo>,
}

pub fn endpoints() -> Vec<EndpointInfo> {
    vec![
        EndpointInfo {
            method: "GET",
            path: "/api/movie/:id",
            description: "Get movie details",
            params: None,
        },
        EndpointInfo {
            method: "GET",
            path: "/api/search",
            description: "Search movies",
            params: Some(&["q", "start", "count"]),
        },
        EndpointInfo {
            method: "POST",
            path: "/api/recommend",
            description: "Get movie recommendations",
            params: Some(&["keywords", "count", "minRating", "exclude"]),
        },
    ]
}

pub async fn health_handler() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn docs_handler() -> Response {
    found(DOCS_PAGE)
}

pub async fn demo_handler() -> Response {
    found(DEMO_PAGE)
}

pub async fn root_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Json<ServiceInfo> {
    let origin = request_origin(
        &headers,
        uri.authority().map(|a| a.as_str()),
        state.config.trust_proxy,
    );

    Json(ServiceInfo {
        message: state.config.service_name.clone(),
        docs: format!("{}/docs", origin),
        demo: format!("{}/demo", origin),
        endpoints: endpoints(),
    })
}

pub async fn fallback_handler() -> Envelope<()> {
    Envelope::failure(StatusCode::NOT_FOUND, "not found")
}

// 302, like a plain `res.redirect` in most web frameworks.
fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
