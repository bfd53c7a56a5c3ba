//! Request body parsers.
//!
//! A parser declares which content types it understands and exposes an
//! injectable `parse` callable, so it can ask for the raw body or any
//! other component.

use std::fmt;
use std::sync::Arc;

use kiln_core::{Callable, KilnError};
use serde_json::{Map, Value as Json};

use crate::body::{RequestBody, RequestData};
use crate::multipart::MultiPartParser;

/// Parses request bodies of the content types it accepts.
pub trait RequestParser: Send + Sync + 'static {
    /// The canonical content type this parser handles.
    fn mime_type(&self) -> &str;

    /// Whether this parser accepts the (lower-cased) content type.
    fn can_parse_content(&self, content_type: &str) -> bool;

    /// The injectable parse operation.
    fn parse(&self) -> Callable<RequestData>;
}

/// The application's parsers, in preference order.
#[derive(Clone)]
pub struct Parsers(Arc<[Arc<dyn RequestParser>]>);

impl Parsers {
    /// Wraps a list of parsers.
    #[must_use]
    pub fn new(parsers: Vec<Arc<dyn RequestParser>>) -> Self {
        Self(parsers.into())
    }

    /// The first parser accepting `content_type`.
    #[must_use]
    pub fn find(&self, content_type: &str) -> Option<&Arc<dyn RequestParser>> {
        self.0
            .iter()
            .find(|parser| parser.can_parse_content(content_type))
    }

    /// Iterates in preference order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RequestParser>> {
        self.0.iter()
    }
}

impl Default for Parsers {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(JsonParser),
            Arc::new(UrlEncodingParser),
            Arc::new(MultiPartParser::default()),
        ])
    }
}

impl fmt::Debug for Parsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|parser| parser.mime_type()))
            .finish()
    }
}

/// Parses `application/json` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl RequestParser for JsonParser {
    fn mime_type(&self) -> &str {
        "application/json"
    }

    fn can_parse_content(&self, content_type: &str) -> bool {
        content_type.starts_with("application/json")
    }

    fn parse(&self) -> Callable<RequestData> {
        Callable::builder("JsonParser::parse")
            .param::<RequestBody>("body")
            .build(|args| {
                let body = args.shared::<RequestBody>("body")?;
                serde_json::from_slice(&body.0)
                    .map(RequestData::new)
                    .map_err(|_| KilnError::parse("JSON input could not be parsed"))
            })
    }
}

/// Parses `application/x-www-form-urlencoded` bodies into a JSON object.
///
/// A field sent once maps to a string, a repeated field to an array.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlEncodingParser;

impl RequestParser for UrlEncodingParser {
    fn mime_type(&self) -> &str {
        "application/x-www-form-urlencoded"
    }

    fn can_parse_content(&self, content_type: &str) -> bool {
        content_type.starts_with("application/x-www-form-urlencoded")
    }

    fn parse(&self) -> Callable<RequestData> {
        Callable::builder("UrlEncodingParser::parse")
            .param::<RequestBody>("body")
            .build(|args| {
                let body = args.shared::<RequestBody>("body")?;
                let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body.0)
                    .map_err(|_| KilnError::parse("failed to parse urlencoded data"))?;
                Ok(RequestData::new(collect_fields(pairs)))
            })
    }
}

pub(crate) fn collect_fields(pairs: Vec<(String, String)>) -> Json {
    let mut fields = Map::new();
    for (name, value) in pairs {
        match fields.get_mut(&name) {
            None => {
                fields.insert(name, Json::String(value));
            }
            Some(Json::Array(values)) => values.push(Json::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Json::Array(vec![first, Json::String(value)]);
            }
        }
    }
    Json::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{Arguments, Value};
    use serde_json::json;

    fn parse(parser: &dyn RequestParser, body: &'static str) -> Result<Json, KilnError> {
        let args = Arguments::new().with("body", Value::new(RequestBody(body.into())));
        parser.parse().call(&args).map(RequestData::into_fields)
    }

    #[test]
    fn test_json_parser() {
        assert!(JsonParser.can_parse_content("application/json; charset=utf-8"));
        assert!(!JsonParser.can_parse_content("text/plain"));
        assert_eq!(parse(&JsonParser, r#"{"a": [1, 2]}"#).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_json_parser_error_message() {
        let err = parse(&JsonParser, "{invalid").unwrap_err();
        assert_eq!(err.to_string(), "JSON input could not be parsed");
    }

    #[test]
    fn test_urlencoded_parser() {
        let data = parse(&UrlEncodingParser, "name=jim&tag=a&tag=b&tag=c&q=a+b").unwrap();
        assert_eq!(
            data,
            json!({"name": "jim", "tag": ["a", "b", "c"], "q": "a b"})
        );
    }

    #[test]
    fn test_parsers_find_first_match() {
        let parsers = Parsers::new(vec![Arc::new(JsonParser), Arc::new(UrlEncodingParser)]);
        assert_eq!(
            parsers.find("application/x-www-form-urlencoded").map(|p| p.mime_type()),
            Some("application/x-www-form-urlencoded")
        );
        assert!(parsers.find("text/xml").is_none());
    }
}
