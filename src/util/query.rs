use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// A query parameter given once, or several times under the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    pub fn first(&self) -> &str {
        match self {
            QueryValue::One(v) => v,
            QueryValue::Many(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            QueryValue::One(v) => vec![v.as_str()],
            QueryValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::One(first) => {
                *self = QueryValue::Many(vec![std::mem::take(first), value]);
            }
            QueryValue::Many(vs) => vs.push(value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryParams {
    map: HashMap<String, QueryValue>,
}

impl<'de> Deserialize<'de> for QueryParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Pairs keep repeated keys, a map would drop them.
        let pairs = Vec::<(String, String)>::deserialize(deserializer)?;
        Ok(QueryParams::from_pairs(pairs))
    }
}

impl QueryParams {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map: HashMap<String, QueryValue> = HashMap::new();
        for (key, value) in pairs {
            match map.get_mut(&key) {
                Some(existing) => existing.push(value),
                None => {
                    map.insert(key, QueryValue::One(value));
                }
            }
        }
        QueryParams { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(QueryValue::first)
    }

    /// First value under `key` that is not blank after trimming.
    pub fn first_non_blank(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)?
            .all()
            .into_iter()
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::Uri};

    fn parse(raw: &str) -> QueryParams {
        let uri: Uri = format!("/?{}", raw).parse().unwrap();
        Query::<QueryParams>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_parse_single_and_repeated() {
        let q = parse("q=matrix&tag=a&tag=b&empty=");
        assert_eq!(q.get("q"), Some("matrix"));
        assert_eq!(q.get("tag"), Some("a"));
        assert_eq!(q.get("empty"), Some(""));
        assert_eq!(q.get("missing"), None);
        assert_eq!(
            q,
            QueryParams::from_pairs(vec![
                ("q".to_string(), "matrix".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("empty".to_string(), String::new()),
            ])
        );
    }

    #[test]
    fn test_parse_decodes() {
        let q = parse("q=%E8%82%96%E7%94%B3%E5%85%8B&title=the+matrix");
        assert_eq!(q.get("q"), Some("肖申克"));
        assert_eq!(q.get("title"), Some("the matrix"));
    }

    #[test]
    fn test_first_non_blank() {
        let q = parse("q=&q=%20%20&q=%20alien%20");
        assert_eq!(q.first_non_blank("q"), Some("alien"));
        assert_eq!(parse("q=").first_non_blank("q"), None);
    }

    #[test]
    fn test_serializes_as_map() {
        let q = parse("a=1&b=2&b=3");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["a"], "1");
        assert_eq!(json["b"], serde_json::json!(["2", "3"]));
    }
}
