//! # Kiln Router
//!
//! Route templates and first-match routing for the Kiln framework.
//!
//! ## Templates
//!
//! | Syntax | Matches | Regex |
//! |--------|---------|-------|
//! | `/accounts` | literal text | escaped |
//! | `{id}` | one path segment | `[^/]+` |
//! | `{*path}` | the rest of the path | `.+` |
//!
//! ## Matching order
//!
//! Routes are scanned per method in most-recently-registered-first order
//! and the first match wins. Registering a route later is how an
//! application overrides an earlier, overlapping one.
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use kiln_router::{Include, Route, Router};
//!
//! let mut router = Router::new();
//! router.add_route(Route::get("/", "index")).unwrap();
//! router
//!     .add_route(
//!         Include::new("/accounts", vec![
//!             Route::get("", "list_accounts").into(),
//!             Route::get("/{id}", "get_account").into(),
//!         ])
//!         .with_namespace("accounts"),
//!     )
//!     .unwrap();
//!
//! let uri = router.reverse_uri("accounts:get_account", [("id", "42")]).unwrap();
//! assert_eq!(uri, "/accounts/42");
//!
//! let matched = router.match_route(&Method::GET, &uri).unwrap();
//! assert_eq!(matched.params.get("id"), Some("42"));
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod params;
mod route;
mod router;
mod template;

use std::sync::Arc;

pub use error::{RouterError, RouterResult};
pub use params::Params;
pub use route::{Include, Route, RouteHandler, RouteNode};
pub use router::Router;
pub use template::{tokenize, PathTemplate, Token};

/// A matched route with the path parameters it captured.
#[derive(Debug)]
pub struct RouteMatch<H> {
    /// The matched route.
    pub route: Arc<Route<H>>,
    /// Captured bindings and globs.
    pub params: Params,
}

impl<H> Clone for RouteMatch<H> {
    fn clone(&self) -> Self {
        Self {
            route: Arc::clone(&self.route),
            params: self.params.clone(),
        }
    }
}
