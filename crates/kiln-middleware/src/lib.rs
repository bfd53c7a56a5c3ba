//! # Kiln Middleware
//!
//! The middleware protocol and the middleware that ships with Kiln.
//!
//! A middleware wraps the rest of the chain: given a [`Next`] it returns
//! a new handler, which is resolved like any other so it can declare
//! dependencies of its own. The application applies its middleware list
//! in reverse, making the first entry the outermost layer:
//!
//! ```text
//! A-before → B-before → handler → B-after → A-after
//! ```
//!
//! ## Included middleware
//!
//! | Middleware | Purpose |
//! |------------|---------|
//! | [`ResponseRendererMiddleware`] | Renders handler data through the renderer the client accepts |
//! | [`RequestIdMiddleware`] | Reuses or generates a request ID (UUID v7) |
//! | [`RequestLoggingMiddleware`] | Logs method, path, status and duration |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use kiln_core::{Callable, InstanceMap, Reply, Resolver};
//! use kiln_middleware::{chain, FnMiddleware, Middleware, Next};
//!
//! let shout: Arc<dyn Middleware> = Arc::new(FnMiddleware::new("shout", |next: Next| {
//!     Callable::builder("shout").build(move |_| {
//!         match next.run()? {
//!             Reply::Data { data, .. } => Ok(Reply::from(data.as_str().unwrap_or_default().to_uppercase())),
//!             other => Ok(other),
//!         }
//!     })
//! }));
//!
//! let handler = Callable::builder("hello").build(|_| Ok(Reply::from("hello")));
//! let resolver = Resolver::new(Vec::new(), InstanceMap::new());
//! let reply = chain(&resolver, &[shout], &handler).run().unwrap();
//! assert_eq!(reply, Reply::from("HELLO"));
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod negotiation;
pub mod renderer;
pub mod stages;

pub use middleware::{chain, chain_from, FnMiddleware, Middleware, Next};
pub use negotiation::{negotiate, ResponseRendererMiddleware};
pub use renderer::{JsonRenderer, Renderers, ResponseRenderer, TextRenderer};
pub use stages::{RequestId, RequestIdMiddleware, RequestLoggingMiddleware, REQUEST_ID_HEADER};
