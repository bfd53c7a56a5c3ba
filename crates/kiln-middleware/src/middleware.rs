//! The middleware protocol.
//!
//! A middleware receives the next step of the chain and returns a
//! replacement handler. That handler is an ordinary [`Callable`], so it
//! declares its own dependencies and is resolved like any route handler.
//!
//! # Example
//!
//! ```rust
//! use kiln_core::{Callable, Handler};
//! use kiln_middleware::{Middleware, Next};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn wrap(&self, next: Next) -> Handler {
//!         Callable::builder("timing").build(move |_| {
//!             let started = std::time::Instant::now();
//!             let reply = next.run();
//!             tracing::debug!(elapsed = ?started.elapsed(), "handled");
//!             reply
//!         })
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use kiln_core::{Handler, KilnResult, Reply, Resolved, Resolver};

/// Wraps the rest of the chain.
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs.
    fn name(&self) -> &'static str;

    /// Returns a handler that runs around `next`.
    ///
    /// The handler must call `next.run()` at most once; not calling it
    /// short-circuits everything inside this middleware.
    fn wrap(&self, next: Next) -> Handler;
}

/// The remainder of the chain as a zero-argument thunk.
#[derive(Clone)]
pub struct Next {
    name: Arc<str>,
    thunk: Arc<dyn Fn() -> KilnResult<Reply> + Send + Sync>,
}

impl Next {
    /// Wraps a plain closure.
    pub fn new<F>(name: impl Into<Arc<str>>, thunk: F) -> Self
    where
        F: Fn() -> KilnResult<Reply> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            thunk: Arc::new(thunk),
        }
    }

    /// Invokes the next middleware or handler.
    ///
    /// # Errors
    ///
    /// Returns whatever the rest of the chain failed with.
    pub fn run(&self) -> KilnResult<Reply> {
        (self.thunk)()
    }

    /// The name of the callable this step invokes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<Resolved<Reply>> for Next {
    fn from(resolved: Resolved<Reply>) -> Self {
        let name = resolved.name().to_string();
        Self::new(name, move || resolved.call())
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Wraps `handler` in `middleware` and binds every layer to `resolver`.
///
/// The list is applied in reverse so the first middleware ends up as the
/// outermost layer.
#[must_use]
pub fn chain(resolver: &Resolver, middleware: &[Arc<dyn Middleware>], handler: &Handler) -> Next {
    chain_from(resolver, middleware, Next::from(resolver.resolve(handler)))
}

/// Like [`chain`], around an already resolved innermost step.
#[must_use]
pub fn chain_from(resolver: &Resolver, middleware: &[Arc<dyn Middleware>], innermost: Next) -> Next {
    middleware.iter().rev().fold(innermost, |next, layer| {
        Next::from(resolver.resolve(&layer.wrap(next)))
    })
}

/// A middleware built from a closure.
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Next) -> Handler + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn wrap(&self, next: Next) -> Handler {
        (self.func)(next)
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{Callable, InstanceMap};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn tracking(label: &'static str, log: Log) -> Arc<dyn Middleware> {
        Arc::new(FnMiddleware::new(label, move |next: Next| {
            let log = Arc::clone(&log);
            Callable::builder(label).build(move |_| {
                log.lock().unwrap().push(format!("{label}-before"));
                let reply = next.run();
                log.lock().unwrap().push(format!("{label}-after"));
                reply
            })
        }))
    }

    #[test]
    fn test_chain_order() {
        let log: Log = Arc::default();
        let handler_log = Arc::clone(&log);
        let handler = Callable::builder("handler").build(move |_| {
            handler_log.lock().unwrap().push("H".to_string());
            Ok(Reply::from("done"))
        });

        let middleware = vec![tracking("A", Arc::clone(&log)), tracking("B", Arc::clone(&log))];
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let reply = chain(&resolver, &middleware, &handler).run().unwrap();

        assert_eq!(reply, Reply::from("done"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A-before", "B-before", "H", "B-after", "A-after"]
        );
    }

    #[test]
    fn test_short_circuit() {
        let handler = Callable::builder("handler").build(|_| -> KilnResult<Reply> {
            panic!("handler must not run")
        });
        let deny: Arc<dyn Middleware> = Arc::new(FnMiddleware::new("deny", |_next: Next| {
            Callable::builder("deny").build(|_| {
                Ok(Reply::with_status(http::StatusCode::FORBIDDEN, serde_json::json!("no")))
            })
        }));

        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let reply = chain(&resolver, &[deny], &handler).run().unwrap();
        assert_eq!(reply.status(), http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_empty_chain_runs_handler() {
        let handler = Callable::builder("handler").build(|_| Ok(Reply::from("x")));
        let resolver = Resolver::new(Vec::new(), InstanceMap::new());
        let next = chain(&resolver, &[], &handler);

        assert_eq!(next.name(), "handler");
        assert_eq!(next.run().unwrap(), Reply::from("x"));
    }
}
