//! Redirect helpers.

use http::StatusCode;
use kiln_core::{KilnResult, Response};

/// Whether a redirect is temporary or permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectType {
    /// The resource may come back at the original location.
    #[default]
    Temporary,
    /// The resource moved for good.
    Permanent,
}

/// Builds a redirect to `target`.
///
/// With `use_modern_codes` the status is 307 or 308, which tell clients
/// to keep the request method. Otherwise it is 302 or 301.
///
/// # Errors
///
/// Fails if `target` is not a valid header value.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use kiln_server::{redirect, RedirectType};
///
/// let response = redirect("/login", RedirectType::Temporary, true).unwrap();
/// assert_eq!(response.status, StatusCode::TEMPORARY_REDIRECT);
/// assert_eq!(response.headers.get("location"), Some("/login"));
/// ```
pub fn redirect(target: &str, kind: RedirectType, use_modern_codes: bool) -> KilnResult<Response> {
    let status = match (kind, use_modern_codes) {
        (RedirectType::Temporary, true) => StatusCode::TEMPORARY_REDIRECT,
        (RedirectType::Permanent, true) => StatusCode::PERMANENT_REDIRECT,
        (RedirectType::Temporary, false) => StatusCode::FOUND,
        (RedirectType::Permanent, false) => StatusCode::MOVED_PERMANENTLY,
    };
    Response::redirect(status, target)
}
