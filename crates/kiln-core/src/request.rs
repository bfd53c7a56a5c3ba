//! The incoming request and the values the pipeline derives from it.

use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{KilnError, KilnResult};
use crate::headers::Headers;

/// Parsed query string: an ordered multimap of names to values.
///
/// # Example
///
/// ```rust
/// use kiln_core::QueryParams;
///
/// let params = QueryParams::parse("tag=a&tag=b&q=hello%20world");
/// assert_eq!(params.get("tag"), Some("b"));
/// assert_eq!(params.get_all("tag"), ["a", "b"]);
/// assert_eq!(params.get("q"), Some("hello world"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(IndexMap<String, Vec<String>>);

impl QueryParams {
    /// Creates empty query params.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string. Undecodable input yields no params.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => pairs.into_iter().collect(),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring undecodable query string");
                Self::new()
            }
        }
    }

    /// The last value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name)?.last().map(String::as_str)
    }

    /// Every value for `name`.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map_or(&[], Vec::as_slice)
    }

    /// Appends a value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Whether `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Iterates over names and their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Whether there are no params.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.add(name, value);
        }
        params
    }
}

/// The raw request body stream.
///
/// Reading consumes the stream; components that need the body cache what
/// they read for the rest of the request.
pub struct RequestInput {
    reader: Mutex<Box<dyn Read + Send>>,
}

impl RequestInput {
    /// Wraps an arbitrary reader.
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Mutex::new(Box::new(reader)),
        }
    }

    /// A stream over an in-memory body.
    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self::new(Cursor::new(body.into()))
    }

    /// An empty stream.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Reads at most `limit` bytes.
    pub fn read(&self, limit: usize) -> KilnResult<Bytes> {
        let mut buf = Vec::with_capacity(limit.min(64 * 1024));
        let mut reader = self.reader.lock();
        reader.by_ref().take(limit as u64).read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Reads everything that is left.
    pub fn read_to_end(&self) -> KilnResult<Bytes> {
        let mut buf = Vec::new();
        self.reader.lock().read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

impl fmt::Debug for RequestInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInput").finish_non_exhaustive()
    }
}

/// The request scheme, e.g. `http`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme(pub String);

/// The request host, without the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host(pub String);

/// The port the request was received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port(pub u16);

/// The raw, undecoded query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryString(pub String);

/// An incoming HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// `http` or `https`.
    pub scheme: String,
    /// Host name.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Request path, without the query string.
    pub path: String,
    /// Raw query string.
    pub query_string: String,
    /// Parsed query string.
    pub params: QueryParams,
    /// Request headers.
    pub headers: Headers,
    /// Body stream.
    pub body: Arc<RequestInput>,
}

impl Request {
    /// Starts building a request for `method` and `target`.
    ///
    /// `target` may carry a query string (`/search?q=x`).
    pub fn builder(method: Method, target: &str) -> RequestBuilder {
        RequestBuilder::new(method, target)
    }
}

/// Builder for [`Request`].
///
/// # Example
///
/// ```rust
/// use http::Method;
/// use kiln_core::Request;
///
/// let request = Request::builder(Method::POST, "/accounts?dry_run=1")
///     .header("content-type", "application/json")
///     .body(r#"{"username": "jim"}"#)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.path, "/accounts");
/// assert_eq!(request.params.get("dry_run"), Some("1"));
/// assert_eq!(request.headers.get("content-length"), Some("19"));
/// ```
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
    body: Option<Bytes>,
    error: Option<KilnError>,
}

impl RequestBuilder {
    fn new(method: Method, target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Self {
            request: Request {
                method,
                scheme: "http".to_string(),
                host: "127.0.0.1".to_string(),
                port: 8000,
                path: path.to_string(),
                query_string: query.to_string(),
                params: QueryParams::parse(query),
                headers: Headers::new(),
                body: Arc::new(RequestInput::empty()),
            },
            body: None,
            error: None,
        }
    }

    /// Sets the scheme.
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.request.scheme = scheme.into();
        self
    }

    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.request.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.request.port = port;
        self
    }

    /// Appends a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Err(err) = self.request.headers.try_add(name, value) {
            self.error.get_or_insert(err);
        }
        self
    }

    /// Replaces all headers.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.request.headers = headers;
        self
    }

    /// Sets an in-memory body and a matching `content-length` header.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a streaming body. No `content-length` is added.
    pub fn body_stream(mut self, input: RequestInput) -> Self {
        self.body = None;
        self.request.body = Arc::new(input);
        self
    }

    /// Finishes the request.
    ///
    /// # Errors
    ///
    /// Returns the first invalid header that was supplied.
    pub fn build(mut self) -> KilnResult<Request> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if let Some(body) = self.body {
            if !self.request.headers.contains("content-length") {
                self.request
                    .headers
                    .try_set("content-length", &body.len().to_string())?;
            }
            self.request.body = Arc::new(RequestInput::from_bytes(body));
        }
        Ok(self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_parse() {
        let params = QueryParams::parse("a=1&b=2&a=3");
        assert_eq!(params.get("a"), Some("3"));
        assert_eq!(params.get_all("a"), ["1", "3"]);
        assert_eq!(params.get("b"), Some("2"));
        assert!(params.get_all("c").is_empty());
        assert!(QueryParams::parse("").is_empty());
    }

    #[test]
    fn test_request_input_read_limit() {
        let input = RequestInput::from_bytes("hello world");
        assert_eq!(input.read(5).unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(input.read_to_end().unwrap(), Bytes::from_static(b" world"));
        assert!(input.read(10).unwrap().is_empty());
    }

    #[test]
    fn test_builder_defaults() {
        let request = Request::builder(Method::GET, "/").build().unwrap();
        assert_eq!(request.scheme, "http");
        assert_eq!(request.port, 8000);
        assert!(request.query_string.is_empty());
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_builder_invalid_header() {
        let result = Request::builder(Method::GET, "/")
            .header("bad header", "x")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_keeps_explicit_content_length() {
        let request = Request::builder(Method::POST, "/")
            .header("content-length", "3")
            .body("abcdef")
            .build()
            .unwrap();
        assert_eq!(request.headers.get_int("content-length"), Some(3));
    }
}
