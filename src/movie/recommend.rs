use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use super::provider::MovieProvider;
use super::types::*;
use crate::envelope::ApiError;

pub const MAX_KEYWORDS: usize = 5;
pub const DEFAULT_COUNT: usize = 10;
pub const MAX_COUNT: usize = 50;
/// Search results fetched per keyword.
pub const CANDIDATES_PER_KEYWORD: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendOptions {
    pub keywords: Vec<String>,
    pub count: usize,
    pub min_rating: f64,
    pub exclude: Vec<String>,
}

impl RecommendOptions {
    pub fn from_request(req: RecommendRequest) -> Result<Self, ApiError> {
        let mut keywords: Vec<String> = Vec::new();
        for kw in req.keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
            if !keywords.iter().any(|k| k == kw) {
                keywords.push(kw.to_string());
            }
        }
        if keywords.is_empty() {
            return Err(ApiError::BadRequest(
                "keywords must contain at least one non-empty keyword".to_string(),
            ));
        }
        keywords.truncate(MAX_KEYWORDS);

        let count = req.count.unwrap_or(DEFAULT_COUNT);
        if count == 0 || count > MAX_COUNT {
            return Err(ApiError::BadRequest(format!(
                "count must be between 1 and {}",
                MAX_COUNT
            )));
        }

        let min_rating = req.min_rating.unwrap_or(0.0);
        if !min_rating.is_finite() || !(0.0..=10.0).contains(&min_rating) {
            return Err(ApiError::BadRequest(
                "minRating must be between 0 and 10".to_string(),
            ));
        }

        Ok(Self {
            keywords,
            count,
            min_rating,
            exclude: req.exclude,
        })
    }
}

/// Search once per keyword and rank the merged candidates.
pub async fn recommend(
    provider: &dyn MovieProvider,
    options: RecommendOptions,
) -> Result<Recommendation, ApiError> {
    let mut hits = Vec::with_capacity(options.keywords.len());
    for keyword in &options.keywords {
        let query = SearchQuery {
            q: keyword.clone(),
            start: 0,
            count: CANDIDATES_PER_KEYWORD,
        };
        let page = provider.search(&query).await?;
        debug!(keyword = %keyword, results = page.subjects.len(), "recommendation candidates");
        hits.push((keyword.clone(), page.subjects));
    }

    let items = rank(hits, &options);
    Ok(Recommendation {
        keywords: options.keywords,
        items,
    })
}

/// Merge by id, filter, then order by number of matching keywords, rating
/// and title.
pub fn rank(
    hits: Vec<(String, Vec<MovieSummary>)>,
    options: &RecommendOptions,
) -> Vec<RecommendedMovie> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<RecommendedMovie> = Vec::new();

    for (keyword, movies) in hits {
        for movie in movies {
            if movie.id.is_empty() || options.exclude.iter().any(|id| *id == movie.id) {
                continue;
            }
            match index.get(&movie.id) {
                Some(&pos) => {
                    let entry = &mut merged[pos];
                    if !entry.matched.contains(&keyword) {
                        entry.matched.push(keyword.clone());
                    }
                }
                None => {
                    index.insert(movie.id.clone(), merged.len());
                    merged.push(RecommendedMovie {
                        movie,
                        matched: vec![keyword.clone()],
                    });
                }
            }
        }
    }

    merged.retain(|m| match m.movie.rating {
        Some(r) => r >= options.min_rating,
        None => options.min_rating <= 0.0,
    });

    merged.sort_by(|a, b| {
        b.matched
            .len()
            .cmp(&a.matched.len())
            .then_with(|| compare_rating(b.movie.rating, a.movie.rating))
            .then_with(|| a.movie.title.cmp(&b.movie.title))
    });
    merged.truncate(options.count);
    merged
}

fn compare_rating(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
