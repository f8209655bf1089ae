use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub ratings_count: u64,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub casts: Vec<String>,
    pub countries: Vec<String>,
    pub aka: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub start: u32,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub start: u32,
    pub count: u32,
    pub total: u32,
    pub subjects: Vec<MovieSummary>,
}

/// Body of `POST /api/recommend`. Accepted as JSON or as a form. List fields
/// may be repeated or comma separated, numbers may arrive as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendRequest {
    #[serde(default, deserialize_with = "one_or_many")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "number_or_text")]
    pub count: Option<usize>,
    #[serde(default, deserialize_with = "number_or_text")]
    pub min_rating: Option<f64>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedMovie {
    pub movie: MovieSummary,
    /// Keywords whose search returned this movie.
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub keywords: Vec<String>,
    pub items: Vec<RecommendedMovie>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        OneOrMany::Many(v) => v,
    })
}

fn number_or_text<'de, D, N>(deserializer: D) -> Result<Option<N>, D::Error>
where
    D: Deserializer<'de>,
    N: Deserialize<'de> + FromStr,
    N::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText<N> {
        Number(N),
        Text(String),
    }

    match Option::<NumberOrText<N>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrText::Text(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommend_request_from_json() {
        let req: RecommendRequest = serde_json::from_str(
            r#"{"keywords":["科幻","太空"],"count":5,"minRating":7.5,"exclude":["1292052"]}"#,
        )
        .unwrap();
        assert_eq!(req.keywords, vec!["科幻", "太空"]);
        assert_eq!(req.count, Some(5));
        assert_eq!(req.min_rating, Some(7.5));
        assert_eq!(req.exclude, vec!["1292052"]);
    }

    #[test]
    fn test_recommend_request_comma_list() {
        let req: RecommendRequest =
            serde_json::from_str(r#"{"keywords":"drama, crime,,"}"#).unwrap();
        assert_eq!(req.keywords, vec!["drama", "crime"]);
        assert!(req.exclude.is_empty());
        assert_eq!(req.count, None);
    }

    #[test]
    fn test_recommend_request_numbers_as_text() {
        let req: RecommendRequest = serde_json::from_value(serde_json::json!({
            "keywords": ["a", "b"],
            "count": "3",
            "minRating": " 7.5 "
        }))
        .unwrap();
        assert_eq!(req.count, Some(3));
        assert_eq!(req.min_rating, Some(7.5));

        let req: RecommendRequest =
            serde_json::from_value(serde_json::json!({"keywords": "a", "count": ""})).unwrap();
        assert_eq!(req.count, None);

        let err = serde_json::from_value::<RecommendRequest>(serde_json::json!({"count": "many"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_summary_skips_missing_fields() {
        let summary = MovieSummary {
            id: "1".to_string(),
            title: "Alien".to_string(),
            original_title: None,
            year: Some("1979".to_string()),
            rating: None,
            genres: vec![],
            poster: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["year"], "1979");
        assert!(json.get("rating").is_none());
        assert!(json.get("originalTitle").is_none());
    }
}
