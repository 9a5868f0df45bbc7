//! Upstream request rewriting and the shared HTTP client.
//!
//! # Responsibilities
//! - Build the pooled client used to reach backends
//! - Rewrite inbound URIs onto a backend base URL
//! - Strip hop-by-hop headers in both directions
//! - Record the client address in `X-Forwarded-For`

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

/// Client used for every upstream call.
pub type HttpClient = Client<HttpConnector, Body>;

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "upgrade",
];

/// Build the upstream client with the given connect timeout.
pub fn build_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Rewrite `uri` so it targets `base`.
///
/// Scheme and authority come from `base`; the base path is joined with the
/// request path using a single slash, and both query strings are kept.
pub fn rewrite_uri(base: &Url, uri: &Uri) -> Result<Uri, axum::http::Error> {
    let host = base.host_str().unwrap_or_default();
    let authority = match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let path = join_paths(base.path(), uri.path());
    let path_and_query = match (base.query().filter(|q| !q.is_empty()), uri.query()) {
        (Some(b), Some(q)) => format!("{}?{}&{}", path, b, q),
        (Some(b), None) => format!("{}?{}", path, b),
        (None, Some(q)) => format!("{}?{}", path, q),
        (None, None) => path,
    };

    Uri::builder()
        .scheme(base.scheme())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append `client` to `X-Forwarded-For`, keeping any earlier hops.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let value = match headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client),
        None => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert("x-forwarded-for", value);
    }
}
