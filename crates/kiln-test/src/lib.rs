//! # Kiln Test
//!
//! In-process testing for Kiln applications. A [`TestClient`] runs
//! requests through [`App::handle`](kiln_server::App::handle) directly:
//! no socket, no runtime, the same routing, injection, middleware and
//! fallback handling as in production.
//!
//! ## Example
//!
//! ```rust
//! use kiln_core::{Callable, QueryParams, Reply};
//! use kiln_router::Route;
//! use kiln_server::App;
//! use kiln_test::TestClient;
//! use serde_json::json;
//!
//! let search = Callable::builder("search")
//!     .param::<QueryParams>("params")
//!     .build(|args| {
//!         let params = args.shared::<QueryParams>("params")?;
//!         Ok(Reply::ok(json!({ "q": params.get("q") })))
//!     });
//! let app = App::builder().route(Route::get("/search", search)).build().unwrap();
//!
//! let client = TestClient::new(app);
//! let response = client.get("/search").query("q", "rust & kiln").send().unwrap();
//!
//! response.assert_status(http::StatusCode::OK);
//! assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"q": "rust & kiln"}));
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::TestClient;
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
