//! Core data models for the cachegate proxy

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

/// Resource classes driving strategy selection
///
/// The class set is closed and ordered; classification evaluates the rules
/// top-down and the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Critical,
    Image,
    Font,
    Api,
    Asset,
    Page,
    Default,
}

impl ResourceClass {
    /// Human-readable label, also used as the strategy tag in metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Critical => "critical",
            ResourceClass::Image => "image",
            ResourceClass::Font => "font",
            ResourceClass::Api => "api",
            ResourceClass::Asset => "asset",
            ResourceClass::Page => "page",
            ResourceClass::Default => "default",
        }
    }
}

impl std::fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract the pathname of a URL, without query string or fragment
///
/// Accepts both absolute URLs and bare paths. Total: never fails, never
/// allocates; an empty path resolves to "/".
pub fn url_path(url: &str) -> &str {
    let no_fragment = url.split('#').next().unwrap_or(url);
    let no_query = no_fragment.split('?').next().unwrap_or(no_fragment);

    let path = match no_query.find("://") {
        Some(idx) => {
            let rest = &no_query[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => no_query,
    };

    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// An intercepted outgoing request
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method of the request
    pub method: Method,
    /// Full request URL (absolute or path-relative)
    pub url: String,
    /// Request headers
    pub headers: HeaderMap,
}

impl ProxyRequest {
    /// Create a GET request for the given URL
    pub fn get(url: impl Into<String>) -> Self {
        ProxyRequest {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Create a request with an explicit method
    pub fn with_method(method: Method, url: impl Into<String>) -> Self {
        ProxyRequest {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Pathname of the request URL
    pub fn path(&self) -> &str {
        url_path(&self.url)
    }

    /// Whether this request is GET-equivalent and therefore classifiable
    ///
    /// Only GET and HEAD requests go through classification; everything
    /// else is passed through to the network unclassified.
    pub fn is_get_like(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

/// A response returned by the proxy
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

const OFFLINE_DOCUMENT: &str = "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Offline</title></head>\n<body>\n<h1>You are offline</h1>\n<p>This page is not available right now. It will load once the connection returns.</p>\n</body>\n</html>\n";

const PLACEHOLDER_IMAGE: &str = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"400\" height=\"300\" viewBox=\"0 0 400 300\"><rect width=\"400\" height=\"300\" fill=\"#e2e5e9\"/><text x=\"200\" y=\"155\" font-family=\"sans-serif\" font-size=\"16\" fill=\"#7a8088\" text-anchor=\"middle\">Image unavailable</text></svg>";

impl ProxyResponse {
    /// Create a 200 response with the given body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ProxyResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Create a response with an explicit status
    pub fn with_status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        ProxyResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Create a JSON response from a serializable value
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        ProxyResponse {
            status,
            headers,
            body: Bytes::from(body),
        }
    }

    /// The generated offline document, served when a page has neither
    /// network nor cache
    pub fn offline_document() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        ProxyResponse {
            status: StatusCode::SERVICE_UNAVAILABLE,
            headers,
            body: Bytes::from_static(OFFLINE_DOCUMENT.as_bytes()),
        }
    }

    /// A locally generated placeholder image, served when an image has
    /// neither network nor cache
    pub fn placeholder_image() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
        ProxyResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(PLACEHOLDER_IMAGE.as_bytes()),
        }
    }

    /// A bare 503 response for critical resources with no fallback left
    pub fn service_unavailable() -> Self {
        ProxyResponse::with_status(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Look up a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_path_absolute() {
        assert_eq!(url_path("http://example.com/css/style.css"), "/css/style.css");
        assert_eq!(url_path("https://example.com/"), "/");
        assert_eq!(url_path("https://example.com"), "/");
    }

    #[test]
    fn test_url_path_relative() {
        assert_eq!(url_path("/api/health"), "/api/health");
        assert_eq!(url_path("/"), "/");
    }

    #[test]
    fn test_url_path_strips_query_and_fragment() {
        assert_eq!(url_path("/img/logo.png?v=3"), "/img/logo.png");
        assert_eq!(url_path("http://example.com/page.html#section"), "/page.html");
        assert_eq!(url_path("/search?q=a#top"), "/search");
    }

    #[test]
    fn test_is_get_like() {
        assert!(ProxyRequest::get("/x").is_get_like());
        assert!(ProxyRequest::with_method(Method::HEAD, "/x").is_get_like());
        assert!(!ProxyRequest::with_method(Method::POST, "/x").is_get_like());
        assert!(!ProxyRequest::with_method(Method::DELETE, "/x").is_get_like());
    }

    #[test]
    fn test_offline_document_shape() {
        let resp = ProxyResponse::offline_document();
        assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(resp.header("content-type"), Some("text/html; charset=utf-8"));
        assert!(std::str::from_utf8(&resp.body).unwrap().contains("offline"));
    }

    #[test]
    fn test_placeholder_image_shape() {
        let resp = ProxyResponse::placeholder_image();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.header("content-type"), Some("image/svg+xml"));
        assert!(std::str::from_utf8(&resp.body).unwrap().starts_with("<svg"));
    }

    #[test]
    fn test_json_response() {
        let resp = ProxyResponse::json(
            StatusCode::SERVICE_UNAVAILABLE,
            &serde_json::json!({"error": "Network unavailable", "cached": false}),
        );
        assert_eq!(resp.status.as_u16(), 503);
        let parsed: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(parsed["error"], "Network unavailable");
        assert_eq!(parsed["cached"], false);
    }
}
