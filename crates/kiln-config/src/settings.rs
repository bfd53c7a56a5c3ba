//! Application settings.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::ConfigError;

/// A tree of settings addressed by dotted paths.
///
/// # Example
///
/// ```rust
/// use kiln_config::Settings;
/// use serde_json::json;
///
/// let settings = Settings::from_value(json!({"a": {"b": [{"c": 42}]}})).unwrap();
/// assert_eq!(settings.deep_get("a.b.0.c"), Some(&json!(42)));
/// assert_eq!(settings.deep_get("a.x"), None);
/// assert!(settings.strict_get("a.x").is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings(Map<String, Value>);

impl Settings {
    /// Empty settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds settings from a JSON object.
    ///
    /// # Errors
    ///
    /// Fails if `value` is not an object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ConfigError::invalid_value("$", format!("expected a table, found {other}"))),
        }
    }

    /// Looks up a top-level setting.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Looks up a nested setting by its dotted path.
    ///
    /// Segments index into tables by name and into arrays by position.
    /// Returns `None` as soon as a segment cannot be followed.
    #[must_use]
    pub fn deep_get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(table) => table.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Looks up a setting that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`] naming `path`.
    pub fn strict_get(&self, path: &str) -> Result<&Value, ConfigError> {
        self.deep_get(path)
            .ok_or_else(|| ConfigError::missing_setting(path))
    }

    /// Deserializes a required setting.
    ///
    /// # Errors
    ///
    /// Fails if the setting is missing or has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ConfigError> {
        let value = self.strict_get(path)?;
        T::deserialize(value).map_err(|err| ConfigError::invalid_value(path, err.to_string()))
    }

    /// Sets a value at a dotted path, creating intermediate tables.
    ///
    /// # Errors
    ///
    /// Fails if a segment of the path is not a table.
    pub fn insert(&mut self, path: &str, value: Value) -> Result<(), ConfigError> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop().unwrap_or_default();

        let mut table = &mut self.0;
        for (depth, segment) in segments.iter().enumerate() {
            let entry = table
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            table = match entry {
                Value::Object(nested) => nested,
                _ => {
                    return Err(ConfigError::invalid_value(
                        segments[..=depth].join("."),
                        "is not a table",
                    ))
                }
            };
        }
        table.insert(last.to_string(), value);
        Ok(())
    }

    /// Iterates top-level settings.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Whether there are no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The settings as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::from_value(json!({
            "database": {"dsn": "sqlite://", "pool": {"size": 4}},
            "hosts": ["a", {"name": "b"}],
            "debug": true,
        }))
        .unwrap()
    }

    #[test]
    fn test_deep_get() {
        let settings = settings();
        assert_eq!(settings.deep_get("database.pool.size"), Some(&json!(4)));
        assert_eq!(settings.deep_get("hosts.1.name"), Some(&json!("b")));
        assert_eq!(settings.deep_get("debug"), Some(&json!(true)));
    }

    #[test]
    fn test_deep_get_missing_segments() {
        let settings = settings();
        assert_eq!(settings.deep_get("database.user"), None);
        assert_eq!(settings.deep_get("hosts.5"), None);
        assert_eq!(settings.deep_get("hosts.first"), None);
        assert_eq!(settings.deep_get("debug.level"), None);
        assert_eq!(settings.deep_get(""), None);
    }

    #[test]
    fn test_strict_get() {
        let settings = settings();
        assert_eq!(settings.strict_get("database.dsn").unwrap(), &json!("sqlite://"));
        assert!(matches!(
            settings.strict_get("database.user"),
            Err(ConfigError::MissingSetting(path)) if path == "database.user"
        ));
    }

    #[test]
    fn test_get_as() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Pool {
            size: u32,
        }

        let settings = settings();
        assert_eq!(settings.get_as::<Pool>("database.pool").unwrap(), Pool { size: 4 });
        assert!(matches!(
            settings.get_as::<u32>("database.dsn"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_insert_creates_tables() {
        let mut settings = Settings::new();
        settings.insert("server.http.port", json!(8080)).unwrap();
        assert_eq!(settings.deep_get("server.http.port"), Some(&json!(8080)));

        settings.insert("flag", json!(true)).unwrap();
        assert!(settings.insert("flag.nested", json!(1)).is_err());
    }

    #[test]
    fn test_from_non_object() {
        assert!(Settings::from_value(json!([1, 2])).is_err());
    }
}
