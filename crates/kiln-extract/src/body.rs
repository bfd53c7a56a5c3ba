//! Request body injection.

use std::ops::Deref;

use bytes::Bytes;
use kiln_core::{Callable, Component, KilnError, Parameter, RequestInput, Resolver, Value};
use serde_json::{json, Value as Json};
use tracing::debug;

use crate::header::Header;
use crate::multipart::UploadedFiles;
use crate::parser::Parsers;

/// The raw request body.
///
/// Reads exactly `Content-Length` bytes when the header is present and
/// the remainder of the input otherwise. Cached per request so the
/// body is only read once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestBody(pub Bytes);

impl Deref for RequestBody {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The request body after parsing.
///
/// Form and JSON fields are kept as a JSON value. Files sent with
/// `multipart/form-data` are kept alongside them, by field name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestData {
    fields: Json,
    files: UploadedFiles,
}

impl RequestData {
    /// Data without files.
    #[must_use]
    pub fn new(fields: Json) -> Self {
        Self::with_files(fields, UploadedFiles::new())
    }

    /// Data with uploaded files.
    #[must_use]
    pub fn with_files(fields: Json, files: UploadedFiles) -> Self {
        Self { fields, files }
    }

    /// Looks up a top-level field of an object body.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Json> {
        self.fields.get(field)
    }

    /// The parsed fields.
    #[must_use]
    pub fn fields(&self) -> &Json {
        &self.fields
    }

    /// Consumes the data and returns the parsed fields.
    #[must_use]
    pub fn into_fields(self) -> Json {
        self.fields
    }

    /// The uploaded files, empty unless the body was multipart.
    #[must_use]
    pub fn files(&self) -> &UploadedFiles {
        &self.files
    }
}

impl From<Json> for RequestData {
    fn from(fields: Json) -> Self {
        Self::new(fields)
    }
}

impl Deref for RequestData {
    type Target = Json;

    fn deref(&self) -> &Self::Target {
        &self.fields
    }
}

/// Provides [`RequestBody`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBodyComponent;

impl Component for RequestBodyComponent {
    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<RequestBody>()
    }

    fn resolve(&self) -> Callable {
        Callable::builder("RequestBodyComponent::resolve")
            .optional::<Header>("content_length")
            .param::<RequestInput>("body_file")
            .build(|args| {
                let input = args.shared::<RequestInput>("body_file")?;
                let body = match args.optional_shared::<Header>("content_length")? {
                    Some(length) => {
                        let length = length.trim().parse::<usize>().map_err(|_| {
                            KilnError::bad_request(json!({"content-length": "invalid value"}))
                        })?;
                        input.read(length)?
                    }
                    None => input.read_to_end()?,
                };
                Ok(Value::new(RequestBody(body)))
            })
    }
}

/// Provides [`RequestData`] by running the first parser that accepts
/// the request's content type.
#[derive(Debug, Clone, Default)]
pub struct RequestDataComponent {
    parsers: Parsers,
}

impl RequestDataComponent {
    /// Parses bodies with `parsers`, tried in order.
    #[must_use]
    pub fn new(parsers: Parsers) -> Self {
        Self { parsers }
    }
}

impl Component for RequestDataComponent {
    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<RequestData>()
    }

    fn resolve(&self) -> Callable {
        let parsers = self.parsers.clone();
        Callable::builder("RequestDataComponent::resolve")
            .optional::<Header>("content_type")
            .param::<Resolver>("resolver")
            .build(move |args| {
                let resolver = args.shared::<Resolver>("resolver")?;
                let content_type = args
                    .optional_shared::<Header>("content_type")?
                    .map(|header| header.to_lowercase())
                    .unwrap_or_default();

                let Some(parser) = parsers.find(&content_type) else {
                    return Err(KilnError::unsupported_media_type(content_type));
                };

                debug!(parser = parser.mime_type(), content_type = %content_type, "parsing request body");
                resolver.call(&parser.parse()).map(Value::new)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderComponent;
    use kiln_core::{Headers, InstanceMap};
    use std::sync::Arc;

    fn resolver(headers: &[(&str, &str)], body: &'static str) -> Resolver {
        let mut instances = InstanceMap::new();
        instances.insert(Headers::from_pairs(headers.iter().copied()).unwrap());
        instances.insert(RequestInput::from_bytes(body));
        Resolver::new(
            vec![
                Arc::new(HeaderComponent),
                Arc::new(RequestBodyComponent),
                Arc::new(RequestDataComponent::default()),
            ],
            instances,
        )
    }

    fn data_handler() -> Callable<Json> {
        Callable::builder("handler")
            .param::<RequestData>("data")
            .build(|args| Ok(args.shared::<RequestData>("data")?.fields().clone()))
    }

    #[test]
    fn test_body_respects_content_length() {
        let resolver = resolver(&[("content-length", "5")], "hello world");
        let handler = Callable::builder("handler")
            .param::<RequestBody>("body")
            .build(|args| Ok(args.shared::<RequestBody>("body")?.0.clone()));

        assert_eq!(resolver.call(&handler).unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn test_body_is_read_once_per_request() {
        let resolver = resolver(&[], "payload");
        let handler = Callable::builder("handler")
            .param::<RequestBody>("first")
            .param::<RequestBody>("second")
            .build(|args| {
                let first = args.shared::<RequestBody>("first")?;
                let second = args.shared::<RequestBody>("second")?;
                Ok(Arc::ptr_eq(&first, &second) && first.0 == "payload")
            });

        assert!(resolver.call(&handler).unwrap());
    }

    #[test]
    fn test_invalid_content_length() {
        let resolver = resolver(&[("content-length", "lots")], "");
        let handler = Callable::builder("handler")
            .param::<RequestBody>("body")
            .build(|_| Ok(()));

        let err = resolver.call(&handler).unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_json_data() {
        let resolver = resolver(&[("content-type", "Application/JSON")], r#"{"x": 1}"#);
        assert_eq!(resolver.call(&data_handler()).unwrap(), json!({"x": 1}));
    }

    #[test]
    fn test_form_data() {
        let resolver = resolver(
            &[("content-type", "application/x-www-form-urlencoded")],
            "a=1&a=2&b=3",
        );
        assert_eq!(
            resolver.call(&data_handler()).unwrap(),
            json!({"a": ["1", "2"], "b": "3"})
        );
    }

    #[test]
    fn test_unsupported_content_type() {
        let resolver = resolver(&[("content-type", "text/xml")], "<x/>");
        let err = resolver.call(&data_handler()).unwrap_err();
        assert!(matches!(err, KilnError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn test_missing_content_type_is_unsupported() {
        let resolver = resolver(&[], "{}");
        let err = resolver.call(&data_handler()).unwrap_err();
        assert!(matches!(err, KilnError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let resolver = resolver(&[("content-type", "application/json")], "{nope");
        let err = resolver.call(&data_handler()).unwrap_err();
        assert!(matches!(err, KilnError::Parse { .. }));
    }
}
