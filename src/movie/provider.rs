use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::types::*;
use crate::config::DoubanConfig;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            UpstreamError::Status(status.as_u16())
        } else {
            UpstreamError::Transport(e.to_string())
        }
    }
}

/// Source of movie data for the `/api` routes.
#[async_trait]
pub trait MovieProvider: Send + Sync {
    /// `Ok(None)` when the provider does not know the id.
    async fn movie(&self, id: &str) -> Result<Option<Movie>, UpstreamError>;
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, UpstreamError>;
}

/// Client for the Douban movie API (`/subject/:id`, `/search`).
pub struct DoubanClient {
    client: reqwest::Client,
    baseurl: String,
    apikey: Option<String>,
}

impl DoubanClient {
    pub fn new(config: &DoubanConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("movie-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            baseurl: config.baseurl.trim_end_matches('/').to_string(),
            apikey: config.apikey.clone(),
        })
    }

    fn subject_url(&self, id: &str) -> String {
        format!("{}/subject/{}", self.baseurl, urlencoding::encode(id))
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match self.apikey {
            Some(ref key) => req.query(&[("apikey", key.as_str())]),
            None => req,
        }
    }
}

#[async_trait]
impl MovieProvider for DoubanClient {
    async fn movie(&self, id: &str) -> Result<Option<Movie>, UpstreamError> {
        let url = self.subject_url(id);
        debug!(url = %url, "fetching movie");

        let response = self.request(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let subject: DoubanSubject = response.error_for_status()?.json().await?;
        Ok(Some(subject.into_movie()))
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage, UpstreamError> {
        let url = format!("{}/search", self.baseurl);
        debug!(url = %url, q = %query.q, start = query.start, count = query.count, "searching movies");

        let start = query.start.to_string();
        let count = query.count.to_string();
        let page: DoubanSearch = self
            .request(&url)
            .query(&[("q", query.q.as_str()), ("start", start.as_str()), ("count", count.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(SearchPage {
            start: page.start,
            count: page.count,
            total: page.total,
            subjects: page.subjects.into_iter().map(DoubanSubject::into_summary).collect(),
        })
    }
}

// Wire types of the Douban v2 API. Everything is optional in practice.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoubanSubject {
    id: String,
    title: String,
    original_title: Option<String>,
    year: Option<String>,
    rating: Option<DoubanRating>,
    ratings_count: u64,
    genres: Vec<String>,
    directors: Vec<DoubanPerson>,
    casts: Vec<DoubanPerson>,
    countries: Vec<String>,
    aka: Vec<String>,
    summary: Option<String>,
    images: Option<DoubanImages>,
    alt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoubanRating {
    average: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoubanPerson {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoubanImages {
    small: Option<String>,
    medium: Option<String>,
    large: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DoubanSearch {
    start: u32,
    count: u32,
    total: u32,
    subjects: Vec<DoubanSubject>,
}

impl DoubanSubject {
    // Douban reports 0 for titles without enough votes.
    fn rating(&self) -> Option<f64> {
        self.rating
            .as_ref()
            .map(|r| r.average)
            .filter(|avg| *avg > 0.0)
    }

    fn poster(&self) -> Option<String> {
        self.images
            .as_ref()
            .and_then(|i| i.large.clone().or_else(|| i.medium.clone()).or_else(|| i.small.clone()))
    }

    fn into_movie(self) -> Movie {
        Movie {
            rating: self.rating(),
            poster: self.poster(),
            id: self.id,
            title: self.title,
            original_title: self.original_title.filter(|t| !t.is_empty()),
            year: self.year.filter(|y| !y.is_empty()),
            ratings_count: self.ratings_count,
            genres: self.genres,
            directors: self.directors.into_iter().map(|p| p.name).collect(),
            casts: self.casts.into_iter().map(|p| p.name).collect(),
            countries: self.countries,
            aka: self.aka,
            summary: self.summary.filter(|s| !s.is_empty()),
            url: self.alt,
        }
    }

    fn into_summary(self) -> MovieSummary {
        MovieSummary {
            rating: self.rating(),
            poster: self.poster(),
            id: self.id,
            title: self.title,
            original_title: self.original_title.filter(|t| !t.is_empty()),
            year: self.year.filter(|y| !y.is_empty()),
            genres: self.genres,
        }
    }
}
