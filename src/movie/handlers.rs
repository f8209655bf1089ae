use axum::extract::{
    rejection::{PathRejection, QueryRejection},
    Path, Query, State,
};
use tracing::info;

use super::recommend::{self, RecommendOptions};
use super::types::*;
use crate::envelope::{ApiError, ApiResult, Envelope};
use crate::extract::ApiBody;
use crate::server::AppState;
use crate::util::QueryParams;

pub const DEFAULT_SEARCH_COUNT: u32 = 20;
pub const MAX_SEARCH_COUNT: u32 = 100;
const MAX_ID_LEN: usize = 32;

pub async fn get_movie(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Movie> {
    let Path(id) =
        id.map_err(|e| ApiError::BadRequest(format!("invalid movie id: {}", e.body_text())))?;
    if id.is_empty() || id.len() > MAX_ID_LEN || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::BadRequest(format!("invalid movie id: {:?}", id)));
    }

    let movie = state
        .movies
        .movie(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("movie not found".to_string()))?;

    Ok(Envelope::ok(movie))
}

pub async fn search_movies(
    State(state): State<AppState>,
    params: Result<Query<QueryParams>, QueryRejection>,
) -> ApiResult<SearchPage> {
    let Query(params) =
        params.map_err(|e| ApiError::BadRequest(format!("invalid query: {}", e.body_text())))?;
    let query = search_query(&params)?;

    let page = state.movies.search(&query).await?;
    info!(q = %query.q, total = page.total, "search completed");
    Ok(Envelope::ok(page))
}

pub async fn recommend_movies(
    State(state): State<AppState>,
    ApiBody(req): ApiBody<RecommendRequest>,
) -> ApiResult<Recommendation> {
    let options = RecommendOptions::from_request(req)?;
    let recommendation = recommend::recommend(state.movies.as_ref(), options).await?;
    Ok(Envelope::ok(recommendation))
}

/// Validate `q`, `start` and `count`.
pub fn search_query(params: &QueryParams) -> Result<SearchQuery, ApiError> {
    let q = params
        .first_non_blank("q")
        .ok_or_else(|| ApiError::BadRequest("query parameter q is required".to_string()))?
        .to_string();

    let start = match params.get("start").map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<u32>().map_err(|_| {
            ApiError::BadRequest("start must be a non-negative integer".to_string())
        })?,
        None => 0,
    };

    let count = match params.get("count").map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse::<u32>()
            .ok()
            .filter(|c| (1..=MAX_SEARCH_COUNT).contains(c))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("count must be between 1 and {}", MAX_SEARCH_COUNT))
            })?,
        None => DEFAULT_SEARCH_COUNT,
    };

    Ok(SearchQuery { q, start, count })
}
