use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::logger::SharedLogSink;
use crate::middleware::{handle_errors, log_request, panic_response, serve_static};
use crate::movie::MovieProvider;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub logger: SharedLogSink,
    pub movies: Arc<dyn MovieProvider>,
    pub assets: ServeDir,
}

impl AppState {
    pub fn new(config: Config, logger: SharedLogSink, movies: Arc<dyn MovieProvider>) -> Self {
        let assets = ServeDir::new(config.public_dir());
        Self {
            config: Arc::new(config),
            logger,
            movies,
            assets,
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/movie/:id", get(crate::movie::get_movie))
        .route("/search", get(crate::movie::search_movies))
        .route("/recommend", post(crate::movie::recommend_movies))
}

/// Assemble the full pipeline. The result does not know how it will be
/// driven: `run` either serves it on a socket or hands it to a host.
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(crate::routes::health_handler))
        .route("/docs", get(crate::routes::docs_handler))
        .route("/demo", get(crate::routes::demo_handler))
        .route("/", get(crate::routes::root_handler))
        .nest("/api", api_routes());
    with_pipeline(routes, state)
}

/// Wrap `routes` in the request pipeline and the 404 fallback.
pub fn with_pipeline(routes: Router<AppState>, state: AppState) -> Router {
    let body_limit = state.config.body_limit;

    // Outermost first. Cors needs a `Default` response body, so the trace
    // body has to stay outside of it.
    let pipeline = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(state.clone(), log_request))
        .layer(axum::middleware::from_fn_with_state(state.clone(), handle_errors))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn_with_state(state.clone(), serve_static));

    routes
        .fallback(crate::routes::fallback_handler)
        .layer(pipeline)
        .with_state(state)
}
