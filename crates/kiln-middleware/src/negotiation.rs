//! Content negotiation.

use http::StatusCode;
use kiln_core::{Callable, Handler, Headers, KilnError, KilnResult, Reply, Response};
use kiln_extract::Header;
use serde_json::Value as Json;
use tracing::debug;

use crate::middleware::{Middleware, Next};
use crate::renderer::Renderers;

/// Renders handler data with the renderer the client accepts.
///
/// Handler results that are already a [`Response`] pass through. Data,
/// [`KilnError::Http`] failures and validation errors (as `400` with the
/// per-field reasons) are rendered by walking the
/// comma-separated `Accept` media types in order: `*/*` picks the first
/// renderer, otherwise the first renderer that accepts the media type
/// wins. When nothing matches the client gets `406 Not Acceptable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseRendererMiddleware;

impl ResponseRendererMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for ResponseRendererMiddleware {
    fn name(&self) -> &'static str {
        "response_renderer"
    }

    fn wrap(&self, next: Next) -> Handler {
        Callable::builder("ResponseRendererMiddleware")
            .param::<Renderers>("renderers")
            .optional::<Header>("accept")
            .build(move |args| {
                let renderers = args.shared::<Renderers>("renderers")?;
                let accept = args.optional_shared::<Header>("accept")?;

                let (status, data, headers) = match next.run() {
                    Ok(Reply::Response(response)) => return Ok(Reply::Response(response)),
                    Ok(Reply::Data { status, data, headers }) => (status, data, headers),
                    Err(KilnError::Http { status, payload, headers }) => (status, payload, headers),
                    Err(KilnError::Validation(errors)) => {
                        (StatusCode::BAD_REQUEST, errors.to_json(), Headers::new())
                    }
                    Err(error) => return Err(error),
                };

                let accept = accept.as_deref().map_or("*/*", |header| header.as_str());
                negotiate(&renderers, accept, status, &data, &headers).map(Reply::Response)
            })
    }
}

/// Renders `data` for the given `Accept` header value.
///
/// # Errors
///
/// Fails when the chosen renderer fails.
pub fn negotiate(
    renderers: &Renderers,
    accept: &str,
    status: StatusCode,
    data: &Json,
    headers: &Headers,
) -> KilnResult<Response> {
    for media_type in accept.split(',') {
        let media_type = media_type.split(';').next().unwrap_or_default().trim();
        let renderer = if media_type == "*/*" {
            renderers.first()
        } else {
            renderers.find(media_type)
        };

        if let Some(renderer) = renderer {
            debug!(renderer = renderer.mime_type(), accept, "rendering response");
            return renderer.render(status, data, headers);
        }
    }

    debug!(accept, "no renderer accepts the request");
    Ok(Response::text(StatusCode::NOT_ACCEPTABLE, "Not Acceptable"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{JsonRenderer, ResponseRenderer, TextRenderer};
    use kiln_core::{InstanceMap, Resolver};
    use kiln_extract::HeaderComponent;
    use serde_json::json;
    use std::sync::Arc;

    struct XmlRenderer;

    impl ResponseRenderer for XmlRenderer {
        fn mime_type(&self) -> &str {
            "application/xml"
        }

        fn can_render_response(&self, accept: &str) -> bool {
            accept.starts_with("application/xml")
        }

        fn render(&self, status: StatusCode, _data: &Json, _headers: &Headers) -> KilnResult<Response> {
            Ok(Response::with_body(status, "<xml/>").content_type("application/xml"))
        }
    }

    fn render_with(renderers: Renderers, accept: Option<&str>, reply: KilnResult<Reply>) -> Response {
        let mut instances = InstanceMap::new();
        instances.insert(renderers);
        let headers = accept.map_or_else(Headers::new, |value| {
            Headers::from_pairs([("accept", value)]).unwrap()
        });
        instances.insert(headers);
        let resolver = Resolver::new(vec![Arc::new(HeaderComponent)], instances);

        let reply = std::sync::Mutex::new(Some(reply));
        let next = Next::new("handler", move || reply.lock().unwrap().take().expect("called once"));
        let handler = ResponseRendererMiddleware.wrap(next);
        match resolver.call(&handler).unwrap() {
            Reply::Response(response) => response,
            Reply::Data { .. } => panic!("data was not rendered"),
        }
    }

    fn both() -> Renderers {
        Renderers::new(vec![Arc::new(JsonRenderer), Arc::new(XmlRenderer)])
    }

    #[test]
    fn test_not_acceptable() {
        let xml_only = Renderers::new(vec![Arc::new(XmlRenderer)]);
        let response = render_with(xml_only, Some("application/json"), Ok(Reply::from(json!(1))));

        assert_eq!(response.status, StatusCode::NOT_ACCEPTABLE);
        assert_eq!(response.text_body(), "Not Acceptable");
    }

    #[test]
    fn test_wildcard_picks_first_renderer() {
        let response = render_with(both(), Some("*/*"), Ok(Reply::from(json!(1))));
        assert_eq!(response.headers.get("content-type"), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn test_missing_accept_is_wildcard() {
        let response = render_with(both(), None, Ok(Reply::from(json!({"a": 1}))));
        assert_eq!(response.text_body(), r#"{"a":1}"#);
    }

    #[test]
    fn test_accept_order_and_parameters() {
        let response = render_with(
            both(),
            Some("text/html, application/xml;q=0.9, */*;q=0.8"),
            Ok(Reply::from(json!(1))),
        );
        assert_eq!(response.text_body(), "<xml/>");
    }

    #[test]
    fn test_http_error_is_rendered() {
        let response = render_with(
            Renderers::new(vec![Arc::new(TextRenderer)]),
            Some("text/plain"),
            Err(KilnError::http(StatusCode::CONFLICT, json!("taken"))),
        );
        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(response.text_body(), "taken");
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let errors = kiln_core::ValidationError::field("name", "this field is required");
        let response = render_with(both(), None, Err(KilnError::from(errors)));

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::from_slice::<Json>(&response.body).unwrap(),
            json!({"name": "this field is required"})
        );
    }

    #[test]
    fn test_response_passes_through() {
        let teapot = Response::text(StatusCode::IM_A_TEAPOT, "short and stout");
        let response = render_with(
            Renderers::new(vec![Arc::new(XmlRenderer)]),
            Some("application/json"),
            Ok(Reply::Response(teapot.clone())),
        );
        assert_eq!(response, teapot);
    }
}
