//! Settings loader.
//!
//! Settings files are TOML documents with a `[common]` table plus one
//! table per environment. The selected environment's table is merged
//! over `common`, then environment-variable overrides are applied, then
//! `"$VAR"` references are substituted from the process environment.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::{ConfigError, Settings};

/// Environment variable consulted when no environment is set explicitly.
pub const ENVIRONMENT_VAR: &str = "KILN_ENVIRONMENT";

/// The environment used when nothing else selects one.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

const COMMON: &str = "common";

/// Builds [`Settings`] from layered sources.
///
/// # Example
///
/// ```
/// use kiln_config::ConfigLoader;
///
/// let toml = r#"
///     [common]
///     pool_size = 1
///     name = "kiln"
///
///     [dev]
///
///     [prod]
///     pool_size = 32
/// "#;
///
/// let settings = ConfigLoader::new()
///     .with_string(toml)
///     .unwrap()
///     .with_environment("prod")
///     .load()
///     .unwrap();
///
/// assert_eq!(settings.deep_get("pool_size"), Some(&serde_json::json!(32)));
/// assert_eq!(settings.deep_get("name"), Some(&serde_json::json!("kiln")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    document: Map<String, Value>,
    environment: Option<String>,
    env_prefix: Option<String>,
    overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file does not exist, cannot be read
    /// or contains invalid TOML.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use kiln_config::ConfigLoader;
    ///
    /// # fn main() -> Result<(), kiln_config::ConfigError> {
    /// let settings = ConfigLoader::new()
    ///     .with_file("settings.toml")?
    ///     .with_env_prefix("APP")
    ///     .load()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        tracing::debug!(path = %path.display(), "loaded settings file");
        self.with_string(&content)
    }

    /// Load configuration from an optional file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    pub fn with_string(mut self, content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        self.document = match toml_to_json(toml::Value::Table(table)) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(self)
    }

    /// Selects the environment table, overriding `KILN_ENVIRONMENT`.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`; with prefix
    /// `APP`, `APP__DATABASE__POOL_SIZE=8` sets `database.pool_size`.
    /// Values are read as TOML scalars when they parse as one, and as
    /// strings otherwise.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Uses `vars` instead of the process environment for overrides and
    /// substitution.
    #[must_use]
    pub fn with_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Load a `.env` file into the process environment.
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err.into()),
        }
        Ok(self)
    }

    /// The environment that [`load`](Self::load) will use.
    #[must_use]
    pub fn environment(&self) -> String {
        self.environment
            .clone()
            .or_else(|| self.var(ENVIRONMENT_VAR))
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
    }

    /// Finalize and return the loaded settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the environment is unknown, an override
    /// does not fit the settings tree, or a `$VAR` cannot be substituted.
    pub fn load(self) -> Result<Settings, ConfigError> {
        let environment = self.environment();
        let mut merged = self.select(&environment)?;

        if let Some(prefix) = &self.env_prefix {
            self.apply_env_overrides(prefix, &mut merged)?;
        }

        let mut root = merged.to_value();
        self.substitute("$", &mut root)?;
        tracing::debug!(environment = %environment, "settings loaded");
        Settings::from_value(root)
    }

    fn var(&self, name: &str) -> Option<String> {
        match &self.overrides {
            Some(vars) => vars.get(name).cloned(),
            None => env::var(name).ok(),
        }
    }

    fn vars(&self) -> Vec<(String, String)> {
        match &self.overrides {
            Some(vars) => vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => env::vars().collect(),
        }
    }

    // Merge the environment table over `common`
    fn select(&self, environment: &str) -> Result<Settings, ConfigError> {
        let mut merged = match self.document.get(COMMON) {
            Some(Value::Object(common)) => common.clone(),
            Some(_) => return Err(ConfigError::invalid_value(COMMON, "is not a table")),
            None => Map::new(),
        };

        let environments: Vec<&str> = self
            .document
            .keys()
            .map(String::as_str)
            .filter(|name| *name != COMMON)
            .collect();

        match self.document.get(environment) {
            Some(Value::Object(table)) => deep_merge(&mut merged, table.clone()),
            Some(_) => return Err(ConfigError::invalid_value(environment, "is not a table")),
            None if environments.is_empty() => {}
            None => {
                return Err(ConfigError::UnknownEnvironment {
                    name: environment.to_string(),
                    available: environments.join(", "),
                })
            }
        }

        Ok(Settings::from(merged))
    }

    // Apply `PREFIX__A__B=value` overrides
    fn apply_env_overrides(&self, prefix: &str, settings: &mut Settings) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut overrides: Vec<(String, String)> = self
            .vars()
            .into_iter()
            .filter(|(key, _)| key.starts_with(&marker))
            .collect();
        overrides.sort();

        for (key, raw) in overrides {
            let path = key[marker.len()..]
                .split("__")
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(".");
            if path.is_empty() {
                continue;
            }
            tracing::debug!(variable = %key, setting = %path, "applying environment override");
            settings.insert(&path, parse_scalar(&raw))?;
        }
        Ok(())
    }

    fn substitute(&self, path: &str, value: &mut Value) -> Result<(), ConfigError> {
        match value {
            Value::String(text) if text.contains('$') => {
                *text = self.expand(path, text)?;
            }
            Value::Array(items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    self.substitute(&format!("{path}.{index}"), item)?;
                }
            }
            Value::Object(table) => {
                for (name, item) in table.iter_mut() {
                    self.substitute(&format!("{path}.{name}"), item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // `$NAME`, `${NAME}` and `$$` for a literal dollar sign
    fn expand(&self, path: &str, text: &str) -> Result<String, ConfigError> {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find('$') {
            output.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            if let Some(tail) = after.strip_prefix('$') {
                output.push('$');
                rest = tail;
                continue;
            }

            let (name, tail) = if let Some(braced) = after.strip_prefix('{') {
                let end = braced.find('}').ok_or_else(|| {
                    ConfigError::substitution(path, format!("invalid substitution syntax in {text:?}"))
                })?;
                (&braced[..end], &braced[end + 1..])
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], &after[end..])
            };

            if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(ConfigError::substitution(
                    path,
                    format!("invalid substitution syntax in {text:?}"),
                ));
            }

            let value = self.var(name).ok_or_else(|| {
                ConfigError::substitution(path, format!("environment variable {name} is missing"))
            })?;
            output.push_str(&value);
            rest = tail;
        }

        output.push_str(rest);
        Ok(output)
    }
}

fn deep_merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (name, value) in overlay {
        let value = match (base.get_mut(&name), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                deep_merge(existing, nested);
                continue;
            }
            (_, value) => value,
        };
        base.insert(name, value);
    }
}

fn parse_scalar(raw: &str) -> Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .map_or_else(|| Value::String(raw.to_string()), toml_to_json)
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(name, value)| (name, toml_to_json(value)))
                .collect(),
        ),
    }
}
