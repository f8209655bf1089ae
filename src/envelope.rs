use std::any::Any;
use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::movie::UpstreamError;

pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";
pub const SUCCESS_MESSAGE: &str = "success";

/// Uniform shape of every JSON body this service produces for `/api/*`
/// and for failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: SUCCESS_MESSAGE.to_string(),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

/// The fixed response for anything that was not handled by a route.
pub fn internal_error_response() -> Response {
    Envelope::failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).into_response()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Client,
    Upstream,
    Unhandled,
}

/// What the error stage knows about a failed request. Attached to the
/// response as an extension by whoever produced the failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub trace: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: None,
        }
    }

    /// Message from `Display`, trace from the `source()` chain.
    pub fn from_error(kind: FailureKind, err: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        Self {
            kind,
            message: err.to_string(),
            trace: if chain.is_empty() {
                None
            } else {
                Some(chain.join("\n"))
            },
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self::new(FailureKind::Unhandled, message)
    }

    /// For a 5xx response that nobody attached a failure to.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(
            FailureKind::Unhandled,
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("status {}", status.as_u16())),
        )
    }
}

pub type ApiResult<T> = Result<Envelope<T>, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// An extractor rejection that keeps its own 4xx status.
    #[error("{1}")]
    Rejected(StatusCode, String),
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Rejected(status, _) if status.is_client_error() => *status,
            ApiError::Rejected(..) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(UpstreamError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> FailureKind {
        match self {
            ApiError::BadRequest(_) | ApiError::NotFound(_) | ApiError::Rejected(..) => {
                FailureKind::Client
            }
            ApiError::Upstream(_) => FailureKind::Upstream,
            ApiError::Internal(_) => FailureKind::Unhandled,
        }
    }

    /// Text the client is allowed to see.
    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Rejected(_, msg) => msg.clone(),
            ApiError::Upstream(UpstreamError::Timeout) => {
                "upstream movie service timed out".to_string()
            }
            ApiError::Upstream(_) => "upstream movie service unavailable".to_string(),
            ApiError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let failure = Failure::from_error(self.kind(), &self);
        let mut response = Envelope::failure(self.status(), self.public_message()).into_response();
        response.extensions_mut().insert(failure);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_ok_envelope_shape() {
        let json = serde_json::to_value(Envelope::ok(vec![1, 2])).unwrap();
        assert_eq!(json["code"], 200);
        assert_eq!(json["message"], "success");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_internal_error_is_fixed() {
        let response = ApiError::Internal("db exploded at line 3".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let failure = response.extensions().get::<Failure>().cloned().unwrap();
        assert_eq!(failure.kind, FailureKind::Unhandled);
        assert!(failure.message.contains("db exploded"));
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"code": 500, "message": "internal server error", "data": null})
        );
    }

    #[tokio::test]
    async fn test_upstream_errors_map_to_gateway_statuses() {
        let timeout = ApiError::from(UpstreamError::Timeout).into_response();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let status = ApiError::from(UpstreamError::Status(503)).into_response();
        assert_eq!(status.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(status).await;
        assert_eq!(json["code"], 502);
        assert_eq!(json["message"], "upstream movie service unavailable");
        assert_eq!(json["data"], Value::Null);
    }

    #[test]
    fn test_bad_request_keeps_message() {
        let err = ApiError::BadRequest("missing q".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "missing q");
    }

    #[test]
    fn test_failure_from_panic_payloads() {
        let s: Box<dyn Any + Send> = Box::new("boom");
        let failure = Failure::from_panic(s.as_ref());
        assert_eq!(failure.message, "boom");
        assert!(failure.trace.is_none());
        let s: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(Failure::from_panic(s.as_ref()).message, "owned boom");
        let s: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(Failure::from_panic(s.as_ref()).message, "unknown panic");
    }

    #[test]
    fn test_failure_from_error_collects_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let failure = Failure::from_error(FailureKind::Unhandled, &io);
        assert_eq!(failure.message, "disk gone");
        assert!(failure.trace.is_none());

        let upstream = ApiError::Upstream(UpstreamError::Transport("reset".to_string()));
        let failure = Failure::from_error(FailureKind::Upstream, &upstream);
        assert!(failure.message.contains("reset"));
        assert!(failure.trace.unwrap().contains("caused by"));
    }

    #[tokio::test]
    async fn test_rejection_keeps_client_status() {
        let err = ApiError::Rejected(StatusCode::PAYLOAD_TOO_LARGE, "too big".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let failure = response.extensions().get::<Failure>().cloned().unwrap();
        assert_eq!(failure.kind, FailureKind::Client);
        let json = body_json(response).await;
        assert_eq!(json["code"], 413);
        assert_eq!(json["message"], "too big");

        let odd = ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR, "x".to_string());
        assert_eq!(odd.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_failure_from_status() {
        let failure = Failure::from_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(failure.message, "Service Unavailable");
        assert_eq!(failure.kind, FailureKind::Unhandled);
    }
}
