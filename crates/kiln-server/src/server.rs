//! The HTTP/1 server.
//!
//! Connections are served by hyper on the tokio runtime. Each request
//! body is collected up front, then the synchronous [`App`] pipeline runs
//! on a blocking thread so handlers and components never stall the
//! reactor.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::header::HOST;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use kiln_core::{Headers, Request, Response};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::{finalize, App};
use crate::config::ServerConfig;
use crate::transport::Transport;

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The configured address.
        addr: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure on the listener.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves an [`App`] over HTTP/1.
///
/// # Example
///
/// ```rust,no_run
/// use kiln_server::{App, Server, ServerConfig};
///
/// # async fn run(app: App) -> Result<(), kiln_server::ServerError> {
/// let config = ServerConfig::builder().http_addr("0.0.0.0:8000").build();
/// Server::new(app, config).run().await
/// # }
/// ```
pub struct Server {
    app: Arc<App>,
    config: ServerConfig,
}

impl Server {
    /// Creates a server for `app`.
    pub fn new(app: App, config: ServerConfig) -> Self {
        Self {
            app: Arc::new(app),
            config,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "cannot listen for ctrl-c; serving until the process exits");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind(self.config.http_addr())
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.config.http_addr().to_string(),
                source,
            })?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// resolves, then waits up to the shutdown timeout for open
    /// connections to finish.
    ///
    /// # Errors
    ///
    /// Fails if the listener's local address cannot be read.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");

        let (closing_tx, closing_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "failed to accept connection");
                            continue;
                        }
                    };
                    debug!(remote = %remote, "connection accepted");

                    let app = Arc::clone(&self.app);
                    let max_body_size = self.config.max_body_size();
                    let keep_alive = self.config.keep_alive();
                    let mut closing = closing_rx.clone();
                    let port = local.port();

                    connections.spawn(async move {
                        let service = service_fn(move |request| {
                            let app = Arc::clone(&app);
                            async move { Ok::<_, Infallible>(dispatch(app, request, port, max_body_size).await) }
                        });
                        let conn = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(TokioIo::new(stream), service);
                        tokio::pin!(conn);

                        let mut draining = false;
                        loop {
                            tokio::select! {
                                result = conn.as_mut() => {
                                    if let Err(err) = result {
                                        debug!(remote = %remote, error = %err, "connection closed with error");
                                    }
                                    break;
                                }
                                _ = closing.changed(), if !draining => {
                                    draining = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        }
                    });
                }
                () = &mut shutdown => break,
            }
        }

        info!(open = connections.len(), "shutting down");
        closing_tx.send_replace(true);

        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(self.config.shutdown_timeout(), drain).await.is_err() {
            warn!(open = connections.len(), "shutdown timeout reached, aborting connections");
            connections.abort_all();
        }

        info!("server stopped");
        Ok(())
    }
}

async fn dispatch(
    app: Arc<App>,
    request: http::Request<Incoming>,
    port: u16,
    max_body_size: usize,
) -> http::Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();

    let body = match Limited::new(body, max_body_size).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) if err.is::<LengthLimitError>() => {
            warn!(limit = max_body_size, "request body too large");
            return into_http(finalize(Response::text(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")));
        }
        Err(err) => {
            warn!(error = %err, "failed to read request body");
            return into_http(finalize(Response::text(StatusCode::BAD_REQUEST, "Bad Request")));
        }
    };

    let target = parts.uri.path_and_query().map_or("/", |target| target.as_str());
    let host = parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.host())
        .map_or("localhost", strip_port)
        .to_string();

    let request = Request::builder(parts.method, target)
        .host(host)
        .port(port)
        .headers(Headers::from(parts.headers))
        .body(body)
        .build();
    let request = match request {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed request");
            return into_http(finalize(Response::text(StatusCode::BAD_REQUEST, "Bad Request")));
        }
    };

    let handled = tokio::task::spawn_blocking(move || {
        let (transport, captured) = Transport::capture();
        let outcome = app.handle(request, Some(transport));
        let taken_over = outcome.is_taken_over();
        outcome.into_response().or_else(|| captured.take()).unwrap_or_else(|| {
            if taken_over {
                warn!("handler took over the transport without sending a response");
            }
            finalize(Response::new(StatusCode::NO_CONTENT))
        })
    })
    .await;

    match handled {
        Ok(response) => into_http(response),
        Err(err) => {
            error!(error = %err, "request handler panicked");
            into_http(finalize(Response::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error",
            )))
        }
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.split_once(':').map_or(host, |(name, _)| name)
}

fn into_http(response: Response) -> http::Response<Full<Bytes>> {
    let mut http_response = http::Response::new(Full::new(response.body));
    *http_response.status_mut() = response.status;
    *http_response.headers_mut() = response.headers.into_map();
    http_response
}
