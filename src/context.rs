use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, HeaderMap, Method},
};

/// What the pipeline knows about an inbound request. Built once by the
/// logging stage and stored in the request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub url: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_request(req: &Request, trust_proxy: bool) -> Self {
        let uri = req.uri();
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        let user_agent = req
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self {
            method: req.method().clone(),
            path: uri.path().to_string(),
            url,
            ip: client_ip(req.headers(), peer, trust_proxy),
            user_agent,
        }
    }
}

/// Peer address, or the first `X-Forwarded-For` hop when the proxy is
/// trusted. Without a socket (host-managed mode) the header is all we have.
pub fn client_ip(headers: &HeaderMap, peer: Option<String>, trust_proxy: bool) -> Option<String> {
    if trust_proxy || peer.is_none() {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        if forwarded.is_some() {
            return forwarded;
        }
    }
    peer
}

/// `proto://host` as seen by the client.
pub fn request_origin(req_headers: &HeaderMap, authority: Option<&str>, trust_proxy: bool) -> String {
    let proto = if trust_proxy {
        req_headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("http")
    } else {
        "http"
    };

    let host = req_headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or(authority)
        .unwrap_or("localhost");

    format!("{}://{}", proto, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn test_context_from_request() {
        let mut req = axum::http::Request::builder()
            .method("GET")
            .uri("/api/search?q=alien&count=5")
            .header("user-agent", "curl/8.0")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("10.0.0.7:5555".parse::<SocketAddr>().unwrap()));

        let ctx = RequestContext::from_request(&req, false);
        assert_eq!(ctx.method, Method::GET);
        assert_eq!(ctx.path, "/api/search");
        assert_eq!(ctx.url, "/api/search?q=alien&count=5");
        assert_eq!(ctx.ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn test_client_ip_ignores_forwarded_unless_trusted() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4, 5.6.7.8")]);
        let peer = Some("10.0.0.1".to_string());
        assert_eq!(client_ip(&h, peer.clone(), false).as_deref(), Some("10.0.0.1"));
        assert_eq!(client_ip(&h, peer, true).as_deref(), Some("1.2.3.4"));
        assert_eq!(client_ip(&h, None, false).as_deref(), Some("1.2.3.4"));
        assert_eq!(client_ip(&HeaderMap::new(), None, false), None);
    }

    #[test]
    fn test_request_origin() {
        let h = headers(&[("host", "example.com"), ("x-forwarded-proto", "https")]);
        assert_eq!(request_origin(&h, None, false), "http://example.com");
        assert_eq!(request_origin(&h, None, true), "https://example.com");
        assert_eq!(
            request_origin(&HeaderMap::new(), Some("api.local:3000"), false),
            "http://api.local:3000"
        );
        assert_eq!(request_origin(&HeaderMap::new(), None, false), "http://localhost");
    }
}
