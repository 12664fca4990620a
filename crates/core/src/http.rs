//! Request identity and response snapshots.
//!
//! These are the only shapes that cross the storage and network boundaries:
//! a request is identified by method and URL, a response is captured as
//! status, headers and body bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// An intercepted request.
///
/// Only the method and URL take part in cache identity. Callers are expected
/// to hand in a canonicalized URL so equal resources map to equal keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
}

impl Request {
    /// Build a request with an explicit method. The method is upper-cased.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url }
    }

    /// Build a GET request.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Parse `input` as an absolute URL and build a GET request for it.
    pub fn parse_get(input: &str) -> Result<Self, Error> {
        let url = Url::parse(input).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;
        Ok(Self::get(url))
    }

    /// Host of the request URL, if any.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Path component of the request URL.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// A response snapshot.
///
/// Cloning shares the body buffer, so handing one copy to the caller and
/// another to a cache write costs no body copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "body_bytes")]
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// Whether the status is exactly 200, the only status the strategies persist.
    pub fn is_ok_200(&self) -> bool {
        self.status == 200
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Content-Type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Plain-text 503 served when neither network nor cache can answer a
    /// navigation and no offline page was ever installed.
    pub fn offline_placeholder() -> Self {
        Self::new(
            503,
            vec![("content-type".to_string(), "text/plain; charset=utf-8".to_string())],
            Bytes::from_static(b"offline: resource unavailable"),
        )
    }
}

mod body_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(body)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let raw: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Ok(Bytes::from(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_method_uppercased() {
        let req = Request::new("get", Url::parse("https://example.com/a").unwrap());
        assert_eq!(req.method, "GET");
        assert_eq!(req.path(), "/a");
        assert_eq!(req.host(), Some("example.com"));
    }

    #[test]
    fn test_parse_get_rejects_relative() {
        let result = Request::parse_get("/index.html");
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = Response::new(200, vec![("Content-Type".into(), "text/html".into())], "hi");
        assert_eq!(resp.content_type(), Some("text/html"));
        assert_eq!(resp.header("x-missing"), None);
    }

    #[test]
    fn test_status_predicates() {
        assert!(Response::new(200, vec![], "").is_ok_200());
        assert!(!Response::new(204, vec![], "").is_ok_200());
        assert!(Response::new(204, vec![], "").is_success());
        assert!(!Response::new(500, vec![], "").is_success());
    }

    #[test]
    fn test_clone_shares_body() {
        let resp = Response::new(200, vec![], vec![1u8, 2, 3]);
        let copy = resp.clone();
        assert_eq!(resp.body.as_ptr(), copy.body.as_ptr());
    }
}
