//! Route template tokenizer, compiler and reverse builder.
//!
//! A template is a path with embedded placeholders:
//!
//! | Syntax | Token | Matches |
//! |--------|-------|---------|
//! | `/accounts` | chunk | the literal text |
//! | `{id}` | binding | one path segment (`[^/]+`) |
//! | `{*path}` | glob | the remainder, slashes included (`.+`) |

use std::fmt;

use regex::Regex;

use crate::error::{RouterError, RouterResult};
use crate::params::Params;

/// A single token of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text.
    Chunk(String),
    /// A named single-segment placeholder.
    Binding(String),
    /// A named placeholder that swallows the rest of the path.
    Glob(String),
}

impl Token {
    /// Returns the placeholder name, or `None` for literal chunks.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Chunk(_) => None,
            Self::Binding(name) | Self::Glob(name) => Some(name),
        }
    }
}

/// Splits a template into tokens.
///
/// An empty leading chunk is emitted when the template starts with a
/// placeholder, so reversing the token stream reproduces the template.
///
/// # Errors
///
/// Returns [`RouterError::TemplateSyntax`] for an unterminated `{` or a
/// placeholder name that is not a valid identifier.
///
/// # Example
///
/// ```rust
/// use kiln_router::{tokenize, Token};
///
/// let tokens = tokenize("/files/{*path}").unwrap();
/// assert_eq!(tokens, vec![
///     Token::Chunk("/files/".into()),
///     Token::Glob("path".into()),
/// ]);
/// ```
pub fn tokenize(template: &str) -> RouterResult<Vec<Token>> {
    let bytes = template.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            tokens.push(Token::Chunk(template[start..i].to_string()));

            let glob = bytes.get(i + 1) == Some(&b'*');
            let name_start = if glob { i + 2 } else { i + 1 };
            let close = template[name_start..]
                .find('}')
                .map(|offset| name_start + offset)
                .ok_or_else(|| RouterError::syntax(template, format!("unmatched {{ at position {i}")))?;

            let name = &template[name_start..close];
            validate_name(template, name)?;
            tokens.push(if glob {
                Token::Glob(name.to_string())
            } else {
                Token::Binding(name.to_string())
            });

            start = close + 1;
            i = close;
        }
        i += 1;
    }

    if start != bytes.len() {
        tokens.push(Token::Chunk(template[start..].to_string()));
    }

    Ok(tokens)
}

fn validate_name(template: &str, name: &str) -> RouterResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RouterError::syntax(
            template,
            format!("invalid placeholder name '{name}'"),
        ))
    }
}

/// A compiled route template.
///
/// # Example
///
/// ```rust
/// use kiln_router::PathTemplate;
///
/// let template = PathTemplate::parse("/accounts/{id}").unwrap();
/// let params = template.match_path("/accounts/42").unwrap();
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(template.reverse([("id", "42")]).unwrap(), "/accounts/42");
/// ```
#[derive(Clone)]
pub struct PathTemplate {
    source: String,
    tokens: Vec<Token>,
    regex: Regex,
}

impl PathTemplate {
    /// Tokenizes and compiles `template`.
    pub fn parse(template: &str) -> RouterResult<Self> {
        let tokens = tokenize(template)?;
        let regex = compile(template, &tokens)?;
        Ok(Self {
            source: template.to_string(),
            tokens,
            regex,
        })
    }

    /// The template as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The token stream.
    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Names of all bindings and globs, in template order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(Token::name)
    }

    /// Matches a full path, returning the captured placeholders.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.tokens.len() / 2);
        for name in self.regex.capture_names().flatten() {
            if let Some(value) = captures.name(name) {
                params.push(name, value.as_str());
            }
        }
        Some(params)
    }

    /// Substitutes `params` into the template.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RouteParamMissing`] naming the first
    /// placeholder that has no value.
    pub fn reverse(&self, params: impl Into<Params>) -> RouterResult<String> {
        let params = params.into();
        let mut uri = String::with_capacity(self.source.len());
        for token in &self.tokens {
            match token {
                Token::Chunk(chunk) => uri.push_str(chunk),
                Token::Binding(name) | Token::Glob(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| RouterError::RouteParamMissing(name.clone()))?;
                    uri.push_str(value);
                }
            }
        }
        Ok(uri)
    }
}

fn compile(template: &str, tokens: &[Token]) -> RouterResult<Regex> {
    let mut pattern = String::from("^");
    for token in tokens {
        match token {
            Token::Chunk(chunk) => pattern.push_str(&regex::escape(chunk)),
            Token::Binding(name) => {
                pattern.push_str(&format!("(?P<{name}>[^/]+)"));
            }
            Token::Glob(name) => {
                pattern.push_str(&format!("(?P<{name}>.+)"));
            }
        }
    }
    pattern.push('$');

    // Duplicate placeholder names are the only way this can fail.
    Regex::new(&pattern).map_err(|e| RouterError::syntax(template, e.to_string()))
}

impl fmt::Debug for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathTemplate")
            .field("source", &self.source)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
