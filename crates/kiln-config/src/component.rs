//! The settings component.

use std::sync::Arc;

use kiln_core::{Callable, Component, KilnError, Parameter, Value};

use crate::{ConfigLoader, Settings};

enum Source {
    Ready(Arc<Settings>),
    Deferred(ConfigLoader),
}

/// Makes [`Settings`] injectable as an application-wide singleton.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use kiln_config::{Settings, SettingsComponent};
/// use kiln_core::{Callable, Component, DependencyInjector, InstanceMap};
/// use serde_json::json;
///
/// let settings = Settings::from_value(json!({"debug": true})).unwrap();
/// let components: Vec<Arc<dyn Component>> = vec![Arc::new(SettingsComponent::new(settings))];
/// let injector = DependencyInjector::new(components).unwrap();
///
/// let debug = Callable::builder("debug")
///     .param::<Settings>("settings")
///     .build(|args| {
///         let settings = args.shared::<Settings>("settings")?;
///         Ok(settings.deep_get("debug") == Some(&json!(true)))
///     });
///
/// assert!(injector.get_resolver(InstanceMap::new()).call(&debug).unwrap());
/// ```
pub struct SettingsComponent {
    source: Source,
}

impl SettingsComponent {
    /// Provides already loaded settings.
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            source: Source::Ready(Arc::new(settings)),
        }
    }

    /// Loads settings when the injector first resolves them.
    #[must_use]
    pub fn from_loader(loader: ConfigLoader) -> Self {
        Self {
            source: Source::Deferred(loader),
        }
    }
}

impl Component for SettingsComponent {
    fn singleton(&self) -> bool {
        true
    }

    fn claims(&self, parameter: &Parameter) -> bool {
        parameter.is::<Settings>()
    }

    fn resolve(&self) -> Callable {
        match &self.source {
            Source::Ready(settings) => {
                let settings = Arc::clone(settings);
                Callable::builder("settings").build(move |_| Ok(Value::shared(Arc::clone(&settings))))
            }
            Source::Deferred(loader) => {
                let loader = loader.clone();
                Callable::builder("load_settings").build(move |_| {
                    let settings = loader
                        .clone()
                        .load()
                        .map_err(|err| KilnError::from(anyhow::Error::new(err)))?;
                    Ok(Value::new(settings))
                })
            }
        }
    }

    fn name(&self) -> &str {
        "SettingsComponent"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{DependencyInjector, InstanceMap};
    use serde_json::json;

    fn settings_handler() -> Callable<Arc<Settings>> {
        Callable::builder("read")
            .param::<Settings>("settings")
            .build(|args| args.shared::<Settings>("settings"))
    }

    #[test]
    fn test_deferred_loader_is_singleton() {
        let loader = ConfigLoader::new()
            .with_string("[common]\nname = \"kiln\"")
            .unwrap()
            .with_vars(Vec::<(String, String)>::new());
        let components: Vec<Arc<dyn Component>> =
            vec![Arc::new(SettingsComponent::from_loader(loader))];
        let injector = DependencyInjector::new(components).unwrap();

        let first = injector.get_resolver(InstanceMap::new()).call(&settings_handler()).unwrap();
        let second = injector.get_resolver(InstanceMap::new()).call(&settings_handler()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.deep_get("name"), Some(&json!("kiln")));
    }

    #[test]
    fn test_load_failure_surfaces_at_startup() {
        let loader = ConfigLoader::new()
            .with_string("[common]\n[dev]\n")
            .unwrap()
            .with_environment("prod")
            .with_vars(Vec::<(String, String)>::new());
        let components: Vec<Arc<dyn Component>> =
            vec![Arc::new(SettingsComponent::from_loader(loader))];

        let err = DependencyInjector::new(components).unwrap_err();
        assert!(err.to_string().contains("prod"));
    }
}
