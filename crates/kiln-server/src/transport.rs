//! Direct access to the connection.
//!
//! A handler that wants to write its own response declares a
//! [`Transport`] parameter, sends through it and then fails with
//! [`KilnError::RequestHandled`]. The pipeline treats that failure as
//! "the response is already out" and renders nothing.

use std::fmt;
use std::sync::Arc;

use kiln_core::{KilnError, KilnResult, Response};
use parking_lot::Mutex;

use crate::app::finalize;

type Writer = dyn Fn(Response) -> KilnResult<()> + Send + Sync;

/// The write side of the current connection.
#[derive(Clone)]
pub struct Transport {
    writer: Arc<Writer>,
}

impl Transport {
    /// Wraps a response writer.
    pub fn new<F>(writer: F) -> Self
    where
        F: Fn(Response) -> KilnResult<()> + Send + Sync + 'static,
    {
        Self {
            writer: Arc::new(writer),
        }
    }

    /// A transport that keeps the first response sent through it.
    ///
    /// Sending twice fails.
    #[must_use]
    pub fn capture() -> (Self, CapturedResponse) {
        let captured = CapturedResponse::default();
        let slot = captured.clone();
        let transport = Self::new(move |response| {
            let mut slot = slot.0.lock();
            if slot.is_some() {
                return Err(KilnError::internal("a response was already sent"));
            }
            *slot = Some(response);
            Ok(())
        });
        (transport, captured)
    }

    /// Writes a response, filling in `content-length`.
    ///
    /// # Errors
    ///
    /// Returns whatever the underlying writer fails with.
    pub fn send(&self, response: Response) -> KilnResult<()> {
        (self.writer)(finalize(response))
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// The response captured by [`Transport::capture`].
#[derive(Clone, Default)]
pub struct CapturedResponse(Arc<Mutex<Option<Response>>>);

impl CapturedResponse {
    /// Takes the captured response, if one was sent.
    #[must_use]
    pub fn take(&self) -> Option<Response> {
        self.0.lock().take()
    }
}

impl fmt::Debug for CapturedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapturedResponse")
            .field(&self.0.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_capture_keeps_first_response() {
        let (transport, captured) = Transport::capture();

        transport.send(Response::text(StatusCode::OK, "streamed")).unwrap();
        let err = transport.send(Response::new(StatusCode::OK)).unwrap_err();
        assert!(matches!(err, KilnError::Internal { .. }));

        let response = captured.take().unwrap();
        assert_eq!(response.text_body(), "streamed");
        assert_eq!(response.headers.get("content-length"), Some("8"));
        assert!(captured.take().is_none());
    }

    #[test]
    fn test_custom_writer() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let transport = Transport::new(move |response: Response| {
            sink.lock().push(response.status);
            Ok(())
        });

        transport.clone().send(Response::new(StatusCode::ACCEPTED)).unwrap();
        assert_eq!(*sent.lock(), vec![StatusCode::ACCEPTED]);
    }
}
