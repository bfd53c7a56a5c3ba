//! # Kiln Core
//!
//! Core types and the dependency resolver for the Kiln framework.
//!
//! - [`KilnError`] - the error taxonomy every layer reports through
//! - [`Request`], [`Headers`], [`QueryParams`], [`RequestInput`] - the incoming request
//! - [`Response`], [`Reply`] - what handlers produce
//! - [`Component`], [`Resolver`], [`DependencyInjector`] - component-based dependency injection
//!
//! ## Resolving a handler
//!
//! ```rust
//! use std::sync::Arc;
//! use kiln_core::{Callable, Component, DependencyInjector, InstanceMap, Provider};
//!
//! struct Database;
//! struct Accounts {
//!     db: Arc<Database>,
//! }
//!
//! let components: Vec<Arc<dyn Component>> = vec![
//!     Arc::new(Provider::<Database>::new(Callable::builder("db").build(|_| Ok(Database))).singleton()),
//!     Arc::new(Provider::<Accounts>::new(
//!         Callable::builder("accounts")
//!             .param::<Database>("db")
//!             .build(|args| Ok(Accounts { db: args.shared("db")? })),
//!     )),
//! ];
//! let injector = DependencyInjector::new(components).unwrap();
//!
//! let handler = Callable::builder("list_accounts")
//!     .param::<Accounts>("accounts")
//!     .build(|args| args.shared::<Accounts>("accounts"));
//!
//! let resolver = injector.get_resolver(InstanceMap::new());
//! let first = resolver.resolve(&handler).call().unwrap();
//! let again = resolver.resolve(&handler).call().unwrap();
//! assert!(Arc::ptr_eq(&first, &again));
//!
//! let other = injector.get_resolver(InstanceMap::new()).call(&handler).unwrap();
//! assert!(!Arc::ptr_eq(&first, &other));
//! assert!(Arc::ptr_eq(&first.db, &other.db));
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod di;
mod error;
mod headers;
mod request;
mod response;

pub use di::{
    Arguments, Callable, CallableBuilder, Coerce, Component, ComponentId, DependencyInjector,
    InstanceKey, InstanceMap, Parameter, Provider, Resolved, Resolver, TypeInfo, Value,
};
pub use error::{KilnError, KilnResult, ValidationError};
pub use headers::Headers;
pub use request::{Host, Port, QueryParams, QueryString, Request, RequestBuilder, RequestInput, Scheme};
pub use response::{Reply, Response};

/// A route handler: a callable producing a [`Reply`].
pub type Handler = Callable<Reply>;
