//! # Kiln Server
//!
//! The application pipeline and its HTTP binding.
//!
//! - [`App`] / [`AppBuilder`]: routes, components, middleware, parsers,
//!   renderers and fallback handlers, assembled once at startup
//! - [`App::handle`]: the synchronous request pipeline, ending in an
//!   [`Outcome`]
//! - [`Transport`]: lets a handler write its own response
//! - [`Server`]: a hyper HTTP/1 server running the pipeline on blocking
//!   threads, with graceful shutdown
//!
//! ## Failure mapping
//!
//! | Failure | Fallback | Default response |
//! |---------|----------|------------------|
//! | no route matched | `not_found` | `404 Not Found` |
//! | `UnsupportedMediaType` | `unsupported_media_type` | `415 Unsupported Media Type` |
//! | `Parse` | `parse_error` | `400 Request cannot be parsed: ...` |
//! | `Http` | none | rendered through negotiation |
//! | `RequestHandled` | none | nothing, the handler took over |
//! | anything else | `internal_error` | `500 Internal Server Error` |
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use kiln_core::{Callable, QueryParams, Reply, Request};
//! use kiln_router::Route;
//! use kiln_server::App;
//! use serde_json::json;
//!
//! let hello = Callable::builder("hello")
//!     .param::<QueryParams>("params")
//!     .build(|args| {
//!         let params = args.shared::<QueryParams>("params")?;
//!         let name = params.get("name").unwrap_or("world");
//!         Ok(Reply::ok(json!({ "hello": name })))
//!     });
//!
//! let app = App::builder().route(Route::get("/hello", hello)).build().unwrap();
//!
//! let request = Request::builder(Method::GET, "/hello?name=kiln").build().unwrap();
//! let response = app.handle(request, None).into_response().unwrap();
//! assert_eq!(response.text_body(), r#"{"hello":"kiln"}"#);
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
pub mod config;
pub mod fallback;
mod redirect;
mod server;
mod transport;

pub use app::{App, AppBuilder, AppRouter, Outcome};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use redirect::{redirect, RedirectType};
pub use server::{Server, ServerError};
pub use transport::{CapturedResponse, Transport};
