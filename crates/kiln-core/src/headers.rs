//! Case-insensitive, multi-valued HTTP headers.

use http::header::{HeaderMap, HeaderName, HeaderValue, IntoHeaderName};

use crate::error::{KilnError, KilnResult};

/// Request or response headers.
///
/// Names are case-insensitive. A header may carry several values; [`get`]
/// returns the last one, [`get_all`] returns all of them in order.
///
/// [`get`]: Headers::get
/// [`get_all`]: Headers::get_all
///
/// # Example
///
/// ```rust
/// use kiln_core::Headers;
///
/// let mut headers = Headers::new();
/// headers.try_add("Accept", "text/html").unwrap();
/// headers.try_add("accept", "application/json").unwrap();
///
/// assert_eq!(headers.get("ACCEPT"), Some("application/json"));
/// assert_eq!(headers.get_all("accept"), vec!["text/html", "application/json"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HeaderMap);

impl Headers {
    /// Creates an empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds headers from string pairs, appending repeated names.
    ///
    /// # Errors
    ///
    /// Fails on an invalid header name or value.
    pub fn from_pairs<'a, I>(pairs: I) -> KilnResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.try_add(name, value)?;
        }
        Ok(headers)
    }

    /// Returns the last value of `name`, if it is valid UTF-8.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get_all(name)
            .iter()
            .last()
            .and_then(|value| value.to_str().ok())
    }

    /// Returns every value of `name` in insertion order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// Parses the last value of `name` as an integer.
    #[must_use]
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|value| value.trim().parse().ok())
    }

    /// Whether `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Replaces every value of `name` with `value`.
    pub fn set<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.0.insert(name, value);
    }

    /// Appends `value` to `name`.
    pub fn add<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.0.append(name, value);
    }

    /// Replaces `name` from strings.
    ///
    /// # Errors
    ///
    /// Fails on an invalid header name or value.
    pub fn try_set(&mut self, name: &str, value: &str) -> KilnResult<()> {
        let (name, value) = parse_pair(name, value)?;
        self.0.insert(name, value);
        Ok(())
    }

    /// Appends to `name` from strings.
    ///
    /// # Errors
    ///
    /// Fails on an invalid header name or value.
    pub fn try_add(&mut self, name: &str, value: &str) -> KilnResult<()> {
        let (name, value) = parse_pair(name, value)?;
        self.0.append(name, value);
        Ok(())
    }

    /// Removes `name`, returning whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some()
    }

    /// Copies every value from `other`, appending to existing names.
    pub fn extend(&mut self, other: &Headers) {
        for (name, value) in &other.0 {
            self.0.append(name.clone(), value.clone());
        }
    }

    /// Iterates over `(name, value)` pairs, skipping non UTF-8 values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
    }

    /// Number of values stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no header is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlying header map.
    #[must_use]
    pub fn as_map(&self) -> &HeaderMap {
        &self.0
    }

    /// Consumes the headers, returning the underlying map.
    #[must_use]
    pub fn into_map(self) -> HeaderMap {
        self.0
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self(map)
    }
}

fn parse_pair(name: &str, value: &str) -> KilnResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| KilnError::internal(format!("invalid header name '{name}'")))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|_| KilnError::internal(format!("invalid value for header '{name}'")))?;
    Ok((header_name, header_value))
}
