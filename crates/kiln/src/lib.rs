//! # Kiln
//!
//! **A dependency-injected request pipeline for synchronous Rust services**
//!
//! Kiln resolves every handler argument through a chain of components:
//!
//! - **Components** claim parameters by type or name and build values for them
//! - **Resolution is lazy** and cached per request, or once per process for singletons
//! - **Middleware** are handlers too, and declare their own dependencies
//! - **Fallbacks** turn failures into responses through the same machinery
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln::prelude::*;
//!
//! #[injectable(crate = "kiln::core")]
//! fn list_accounts(accounts: Arc<AccountManager>, prefix: Option<QueryParam>) -> KilnResult<Reply> {
//!     Reply::serialize(&accounts.search(prefix.as_deref().map(QueryParam::as_str)))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     kiln::telemetry::init_logging(&LogConfig::development())?;
//!
//!     let app = App::builder()
//!         .component(SettingsComponent::from_loader(ConfigLoader::new().with_file("settings.toml")?))
//!         .component(Provider::<AccountManager>::new(account_manager()).singleton())
//!         .middleware(RequestIdMiddleware::new())
//!         .route(Route::get("/accounts", list_accounts()))
//!         .build()?;
//!
//!     Server::new(app, ServerConfig::default()).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Crates
//!
//! | Module | Crate | Contents |
//! |--------|-------|----------|
//! | [`core`] | `kiln-core` | errors, request/response types, the injector |
//! | [`router`] | `kiln-router` | route templates, routes, includes |
//! | [`extract`] | `kiln-extract` | built-in components, parsers, schemas |
//! | [`middleware`] | `kiln-middleware` | middleware protocol, renderers |
//! | [`config`] | `kiln-config` | settings and the TOML loader |
//! | [`telemetry`] | `kiln-telemetry` | logging and metrics |
//! | [`server`] | `kiln-server` | the app pipeline and HTTP server |
//! | [`test`] | `kiln-test` | in-process test client |

#![doc(html_root_url = "https://docs.rs/kiln/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use kiln_core as core;

// Re-export routing
pub use kiln_router as router;

// Re-export built-in components
pub use kiln_extract as extract;

// Re-export middleware
pub use kiln_middleware as middleware;

// Re-export configuration
pub use kiln_config as config;

// Re-export observability
pub use kiln_telemetry as telemetry;

// Re-export the pipeline and server
pub use kiln_server as server;

// Re-export test tooling
pub use kiln_test as test;

// Re-export macros
pub use kiln_macros::injectable;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use kiln::prelude::*;
///
/// let ping = Callable::builder("ping").build(|_| Ok(Reply::ok(serde_json::json!("pong"))));
/// let app = App::builder().route(Route::get("/ping", ping)).build().unwrap();
/// assert_eq!(app.router().len(), 1);
/// ```
pub mod prelude {
    pub use kiln_core::{
        Arguments, Callable, Component, DependencyInjector, Handler, Headers, KilnError,
        KilnResult, Parameter, Provider, QueryParams, Reply, Request, Resolver, Response, Value,
    };

    // Re-export routing
    pub use kiln_router::{Include, Route, Router};

    // Re-export common components and schema loading
    pub use kiln_extract::{
        Cookies, Field, Header, Loader, Nested, QueryParam, RequestBody, RequestData, Schema,
        UploadedFile,
    };

    // Re-export middleware
    pub use kiln_middleware::{
        FnMiddleware, Middleware, Next, RequestId, RequestIdMiddleware, RequestLoggingMiddleware,
    };

    // Re-export configuration
    pub use kiln_config::{ConfigLoader, Settings, SettingsComponent};

    // Re-export observability
    pub use kiln_telemetry::{LogConfig, MetricsMiddleware};

    // Re-export the pipeline and server
    pub use kiln_server::{redirect, App, Outcome, RedirectType, Server, ServerConfig, Transport};

    // Re-export the injectable macro
    pub use kiln_macros::injectable;
}
