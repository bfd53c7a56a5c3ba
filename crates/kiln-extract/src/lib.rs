//! # Kiln Extract
//!
//! The built-in components that turn parts of a request into handler
//! arguments, the body parsers behind [`RequestData`] (JSON, urlencoded
//! and multipart forms), and schema loading.
//!
//! ## Components
//!
//! | Component | Provides | Cached per request |
//! |-----------|----------|--------------------|
//! | [`HeaderComponent`] | [`Header`], named after the parameter | no |
//! | [`CookiesComponent`] | [`Cookies`] | yes |
//! | [`QueryParamComponent`] | [`QueryParam`], named after the parameter | no |
//! | [`RequestBodyComponent`] | [`RequestBody`] | yes |
//! | [`RequestDataComponent`] | [`RequestData`] through the first matching [`RequestParser`] | yes |
//! | [`UploadedFileComponent`] | [`UploadedFile`], named after the parameter | no |
//! | [`SchemaComponent`] | registered [`Schema`] types | no |
//! | [`RouteParamsComponent`] | path parameters, coerced to the declared type | no |
//! | [`RouteComponent`] | the matched [`CurrentRoute`] | yes |
//!
//! The last two are request-scoped: the pipeline adds them to a
//! request's resolver once routing is done.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kiln_core::{Callable, Headers, InstanceMap, QueryParams, Resolver};
//! use kiln_extract::{default_components, Header, Parsers, QueryParam};
//!
//! let mut instances = InstanceMap::new();
//! instances.insert(Headers::from_pairs([("x-api-key", "secret")]).unwrap());
//! instances.insert(QueryParams::parse("page=2"));
//! let resolver = Resolver::new(default_components(Parsers::default()), instances);
//!
//! let handler = Callable::builder("list")
//!     .param::<Header>("x_api_key")
//!     .param::<QueryParam>("page")
//!     .build(|args| {
//!         let key = args.shared::<Header>("x_api_key")?;
//!         let page = args.shared::<QueryParam>("page")?;
//!         Ok(format!("{}:{}", key.as_str(), page.as_str()))
//!     });
//!
//! assert_eq!(resolver.call(&handler).unwrap(), "secret:2");
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod cookie;
mod header;
mod multipart;
mod parser;
mod path;
mod query;
pub mod schema;

use std::sync::Arc;

use kiln_core::Component;

pub use body::{RequestBody, RequestBodyComponent, RequestData, RequestDataComponent};
pub use cookie::{Cookies, CookiesComponent, SameSite, SetCookie};
pub use header::{header_name, Header, HeaderComponent};
pub use multipart::{
    MultiPartParser, MultipartConfig, UploadedFile, UploadedFileComponent, UploadedFiles,
};
pub use parser::{JsonParser, Parsers, RequestParser, UrlEncodingParser};
pub use path::{CurrentRoute, RouteComponent, RouteParamsComponent};
pub use query::{QueryParam, QueryParamComponent};
pub use schema::{Field, FieldError, FieldValue, Loader, Nested, Schema, SchemaComponent};

/// The built-in components, in resolution order.
#[must_use]
pub fn default_components(parsers: Parsers) -> Vec<Arc<dyn Component>> {
    vec![
        Arc::new(HeaderComponent),
        Arc::new(CookiesComponent),
        Arc::new(QueryParamComponent),
        Arc::new(RequestBodyComponent),
        Arc::new(RequestDataComponent::new(parsers)),
        Arc::new(UploadedFileComponent),
    ]
}
