//! Response renderers.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use kiln_core::{Headers, KilnResult, Response};
use serde_json::Value as Json;

/// Turns handler data into a response of one media type.
pub trait ResponseRenderer: Send + Sync + 'static {
    /// The media type this renderer produces.
    fn mime_type(&self) -> &str;

    /// Whether this renderer can satisfy one `Accept` media type.
    fn can_render_response(&self, accept: &str) -> bool;

    /// Renders `data`, adding `headers` to the response.
    ///
    /// # Errors
    ///
    /// Fails when the data cannot be represented in this media type.
    fn render(&self, status: StatusCode, data: &Json, headers: &Headers) -> KilnResult<Response>;
}

/// Renders data as `application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ResponseRenderer for JsonRenderer {
    fn mime_type(&self) -> &str {
        "application/json"
    }

    fn can_render_response(&self, accept: &str) -> bool {
        accept.starts_with("application/json")
    }

    fn render(&self, status: StatusCode, data: &Json, headers: &Headers) -> KilnResult<Response> {
        let mut response = Response::json(status, data)?;
        response.headers.extend(headers);
        Ok(response)
    }
}

/// Renders data as `text/plain`.
///
/// Strings are sent as-is; anything else is sent as its JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextRenderer;

impl ResponseRenderer for TextRenderer {
    fn mime_type(&self) -> &str {
        "text/plain"
    }

    fn can_render_response(&self, accept: &str) -> bool {
        accept.starts_with("text/plain")
    }

    fn render(&self, status: StatusCode, data: &Json, headers: &Headers) -> KilnResult<Response> {
        let body = match data {
            Json::String(text) => text.clone(),
            Json::Null => String::new(),
            other => other.to_string(),
        };
        let mut response = Response::text(status, body);
        response.headers.extend(headers);
        Ok(response)
    }
}

/// The application's renderers, in preference order.
///
/// Registered as a singleton instance so middleware can ask for it.
#[derive(Clone)]
pub struct Renderers(Arc<[Arc<dyn ResponseRenderer>]>);

impl Renderers {
    /// Wraps a list of renderers.
    #[must_use]
    pub fn new(renderers: Vec<Arc<dyn ResponseRenderer>>) -> Self {
        Self(renderers.into())
    }

    /// The first renderer, used for `*/*`.
    #[must_use]
    pub fn first(&self) -> Option<&Arc<dyn ResponseRenderer>> {
        self.0.first()
    }

    /// The first renderer accepting `accept`.
    #[must_use]
    pub fn find(&self, accept: &str) -> Option<&Arc<dyn ResponseRenderer>> {
        self.0.iter().find(|renderer| renderer.can_render_response(accept))
    }

    /// Whether there are no renderers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Renderers {
    fn default() -> Self {
        Self::new(vec![Arc::new(JsonRenderer)])
    }
}

impl fmt::Debug for Renderers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|renderer| renderer.mime_type()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_renderer() {
        let mut headers = Headers::new();
        headers.try_set("x-total", "2").unwrap();
        let response = JsonRenderer
            .render(StatusCode::CREATED, &json!({"id": 1}), &headers)
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers.get("content-type"), Some("application/json; charset=utf-8"));
        assert_eq!(response.headers.get("x-total"), Some("2"));
        assert_eq!(response.text_body(), r#"{"id":1}"#);
    }

    #[test]
    fn test_text_renderer() {
        let response = TextRenderer
            .render(StatusCode::OK, &json!("hello"), &Headers::new())
            .unwrap();
        assert_eq!(response.text_body(), "hello");

        let response = TextRenderer
            .render(StatusCode::OK, &json!([1, 2]), &Headers::new())
            .unwrap();
        assert_eq!(response.text_body(), "[1,2]");
    }

    #[test]
    fn test_find_in_order() {
        let renderers = Renderers::new(vec![Arc::new(TextRenderer), Arc::new(JsonRenderer)]);
        assert_eq!(renderers.first().map(|r| r.mime_type()), Some("text/plain"));
        assert_eq!(
            renderers.find("application/json").map(|r| r.mime_type()),
            Some("application/json")
        );
        assert!(renderers.find("application/xml").is_none());
    }
}
