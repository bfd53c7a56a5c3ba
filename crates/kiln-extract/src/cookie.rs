//! Request cookies and `Set-Cookie` response helpers.
//!
//! ```rust
//! use kiln_extract::{Cookies, SameSite, SetCookie};
//!
//! let cookies = Cookies::parse("session=abc123; theme=dark");
//! assert_eq!(cookies.get("theme"), Some("dark"));
//!
//! let cookie = SetCookie::new("session", "abc123")
//!     .http_only(true)
//!     .same_site(SameSite::Strict)
//!     .path("/");
//! assert_eq!(cookie.encode(), "session=abc123; Path=/; HttpOnly; SameSite=Strict");
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use kiln_core::{Callable, Component, KilnResult, Parameter, Response, Value};

use crate::header::Header;

/// The cookies sent with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies {
    cookies: IndexMap<String, String>,
}

impl Cookies {
    /// Create an empty Cookies instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` header value.
    ///
    /// Names and values are percent-decoded. Pieces that don't decode
    /// are skipped. A repeated name keeps its last value.
    #[must_use]
    pub fn parse(header_value: &str) -> Self {
        let mut cookies = IndexMap::new();
        for piece in header_value.split(';') {
            let piece = piece.trim_start();
            if piece.is_empty() {
                continue;
            }

            match serde_urlencoded::from_str::<Vec<(String, String)>>(piece) {
                Ok(pairs) => cookies.extend(pairs),
                Err(error) => tracing::debug!(%error, "skipping malformed cookie"),
            }
        }
        Self { cookies }
    }

    /// Get a cookie value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Check if a cookie exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Iterates cookies in the order they were sent.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get the number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Check if there are no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

/// Provides [`Cookies`] from the `cookie` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookiesComponent;

impl Component for CookiesComponent {
    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<Cookies>()
    }

    fn resolve(&self) -> Callable {
        Callable::builder("CookiesComponent::resolve")
            .optional::<Header>("cookie")
            .build(|args| {
                let cookies = args
                    .optional_shared::<Header>("cookie")?
                    .map_or_else(Cookies::new, |header| Cookies::parse(&header));
                Ok(Value::new(cookies))
            })
    }
}

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    /// Cookie is sent with same-site and cross-site top-level navigations.
    Lax,
    /// Cookie is only sent with same-site requests.
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lax => write!(f, "Lax"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// Builder for a `Set-Cookie` response header.
#[derive(Debug, Clone)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: Option<Duration>,
    expires: Option<DateTime<Utc>>,
    domain: Option<String>,
    path: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    /// Create a new Set-Cookie builder.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            expires: None,
            domain: None,
            path: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// A cookie that tells the client to drop `name`.
    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(Duration::ZERO)
    }

    /// Set the Max-Age attribute.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Set the Expires attribute.
    #[must_use]
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    /// Set the Domain attribute.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the Path attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the Secure attribute.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `HttpOnly` attribute.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` attribute.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Get the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encodes the cookie as a `Set-Cookie` header value.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut parts = vec![format!(
            "{}={}",
            urlencoding::encode(&self.name),
            urlencoding::encode(&self.value)
        )];

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }
        if let Some(expires) = self.expires {
            parts.push(format!("Expires={}", expires.format("%a, %d-%b-%Y %H:%M:%S GMT")));
        }
        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={domain}"));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("Path={path}"));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }

    /// Appends this cookie to a response's `set-cookie` headers.
    ///
    /// # Errors
    ///
    /// Fails if the encoded cookie is not a valid header value.
    pub fn apply(&self, response: &mut Response) -> KilnResult<()> {
        response.headers.try_add("set-cookie", &self.encode())
    }
}
