//! Request and response descriptors exchanged across the interception,
//! network and cache boundaries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Error;
use crate::cache::hash::compute_request_key;

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
}

impl Request {
    /// Build a plain GET request with no headers.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, headers: BTreeMap::new() }
    }

    /// Attach a header, lowercasing its name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Canonical identity used as the store key.
    pub fn cache_key(&self) -> String {
        compute_request_key(&self.url)
    }
}

/// A response snapshot, either fresh from the network or read from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: BTreeMap::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// 2xx responses are the only ones written to a store.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

/// Network fetch boundary.
///
/// Any HTTP status is a successful fetch. Implementations fail with
/// [`Error::NetworkUnavailable`] only when no response was obtained.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}
