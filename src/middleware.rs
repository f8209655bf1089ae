use std::any::Any;

use axum::{
    body::Body,
    extract::{OriginalUri, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tower::ServiceExt;

use crate::context::RequestContext;
use crate::envelope::{internal_error_response, Failure, FailureKind};
use crate::logger::{LogLevel, LogRecord};
use crate::server::AppState;

/// Build the request context, emit one record for the request, continue.
pub async fn log_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::from_request(&req, state.config.trust_proxy);

    state.logger.record(
        LogRecord::info(format!("{} {}", ctx.method, ctx.url))
            .with("method", ctx.method.as_str())
            .with("url", ctx.url.as_str())
            .with("ip", ctx.ip.clone().map(Value::from).unwrap_or(Value::Null))
            .with(
                "userAgent",
                ctx.user_agent.clone().map(Value::from).unwrap_or(Value::Null),
            ),
    );

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Terminal error stage. Logs every failure exactly once and makes sure an
/// unhandled one leaves as the fixed 500 envelope.
pub async fn handle_errors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let (method, path) = match req.extensions().get::<RequestContext>() {
        Some(ctx) => (ctx.method.clone(), ctx.path.clone()),
        None => {
            let path = req
                .extensions()
                .get::<OriginalUri>()
                .map(|OriginalUri(uri)| uri.path().to_string())
                .unwrap_or_else(|| req.uri().path().to_string());
            (req.method().clone(), path)
        }
    };

    let mut response = next.run(req).await;

    let failure = match response.extensions_mut().remove::<Failure>() {
        Some(failure) => failure,
        None if response.status().is_server_error() => Failure::from_status(response.status()),
        None => return response,
    };

    let level = match failure.kind {
        FailureKind::Client => LogLevel::Warn,
        FailureKind::Upstream | FailureKind::Unhandled => LogLevel::Error,
    };
    state.logger.record(
        LogRecord::new(level, "application error")
            .with("error", failure.message.as_str())
            .with("stack", failure.trace.clone().map(Value::from).unwrap_or(Value::Null))
            .with("path", path)
            .with("method", method.as_str()),
    );

    if failure.kind == FailureKind::Unhandled {
        return internal_error_response();
    }
    response
}

/// Response for a handler that panicked. The error stage above picks the
/// failure up from the extensions.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response
        .extensions_mut()
        .insert(Failure::from_panic(payload.as_ref()));
    response
}

/// Serve a file from the public directory if one matches, otherwise fall
/// through to the routes.
pub async fn serve_static(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return next.run(req).await;
    }

    // ServeDir only needs the head of the request.
    let mut probe = Request::new(Body::empty());
    *probe.method_mut() = req.method().clone();
    *probe.uri_mut() = req.uri().clone();
    *probe.headers_mut() = req.headers().clone();

    let response = match state.assets.clone().oneshot(probe).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    match response.status() {
        StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED => next.run(req).await,
        _ => response.map(Body::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_response_carries_failure() {
        let response = panic_response(Box::new("kaboom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let failure = response.extensions().get::<Failure>().unwrap();
        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert_eq!(failure.message, "kaboom");
    }
}
