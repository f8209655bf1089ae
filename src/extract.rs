use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header,
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::envelope::ApiError;
use crate::util::QueryParams;

/// A body decoded from either JSON or `application/x-www-form-urlencoded`,
/// chosen by `Content-Type`. Rejections become a 4xx envelope with the
/// rejection's own status. Repeated form keys decode as a list.
#[derive(Debug, Clone)]
pub struct ApiBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase())
            .unwrap_or_default();

        if content_type.starts_with("application/json") || content_type.contains("+json") {
            let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
                ApiError::Rejected(e.status(), format!("invalid JSON body: {}", e.body_text()))
            })?;
            Ok(ApiBody(value))
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(params) = Form::<QueryParams>::from_request(req, state).await.map_err(|e| {
                ApiError::Rejected(e.status(), format!("invalid form body: {}", e.body_text()))
            })?;
            from_form(&params).map(ApiBody)
        } else if content_type.is_empty() {
            Err(ApiError::BadRequest("missing request body".to_string()))
        } else {
            Err(ApiError::BadRequest(format!(
                "unsupported content type: {}",
                content_type
            )))
        }
    }
}

// Single values become strings and repeated keys become arrays, so list
// fields see either shape.
fn from_form<T: DeserializeOwned>(params: &QueryParams) -> Result<T, ApiError> {
    serde_json::to_value(params)
        .and_then(serde_json::from_value)
        .map_err(|e| ApiError::BadRequest(format!("invalid form body: {}", e)))
}
