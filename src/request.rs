//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;

use crate::method::Method;

/// An incoming HTTP request.
///
/// The transport supplies the method, URL, headers, and body. The router
/// assigns `path` (normalized), `query`, and `params` as it handles the
/// exchange; a handler running under a mounted sub-router sees the
/// prefix-stripped `path` and `url`.
pub struct Request {
    method: Method,
    url: String,
    path: String,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    /// A bare request, as the transport would build it — useful for driving
    /// [`Router::handle`](crate::Router::handle) directly in tests or
    /// embeddings. `url` is the `path[?query]` form.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self::from_parts(method, url.into(), Vec::new(), Bytes::new())
    }

    pub(crate) fn from_parts(
        method: Method,
        url: String,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            url,
            path: String::new(),
            query: HashMap::new(),
            params: HashMap::new(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The request target in `path[?query]` form.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The normalized request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter, as bound by the matcher.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns
    /// `Some("42")`. A trailing wildcard binds under `"*"`. Segments are
    /// bound verbatim — no percent-decoding is applied to path parameters.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns a query-string value, percent-decoded.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn query_map(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub(crate) fn prepare(&mut self, path: String, query: HashMap<String, String>) {
        self.path = path;
        self.query = query;
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Rewrites `path` and `url` to the prefix-stripped form before the
    /// request is handed to a mounted sub-router. The query string tail is
    /// kept as-is.
    pub(crate) fn rewrite_for_mount(&mut self, stripped: &str) {
        let suffix = self.url.find('?').map(|at| self.url[at..].to_owned());
        self.url = match suffix {
            Some(suffix) => format!("{stripped}{suffix}"),
            None => stripped.to_owned(),
        };
        self.path = stripped.to_owned();
    }
}
