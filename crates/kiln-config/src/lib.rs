//! Settings for Kiln applications.
//!
//! This crate loads application settings from TOML and makes them
//! injectable:
//! - One `[common]` table plus one table per environment
//! - Environment selection via `KILN_ENVIRONMENT` (defaults to `dev`)
//! - `$VAR` and `${VAR}` substitution from the process environment
//! - Environment variable overrides (`PREFIX__SECTION__KEY`)
//! - Optional `.env` loading
//!
//! # Example
//!
//! ```no_run
//! use kiln_config::{ConfigLoader, SettingsComponent};
//!
//! # fn main() -> Result<(), kiln_config::ConfigError> {
//! let loader = ConfigLoader::new()
//!     .with_dotenv()?
//!     .with_file("settings.toml")?
//!     .with_env_prefix("APP");
//!
//! let settings = loader.clone().load()?;
//! println!("pool size: {:?}", settings.deep_get("database.pool_size"));
//!
//! // Or resolve it lazily as a singleton component.
//! let component = SettingsComponent::from_loader(loader);
//! # Ok(())
//! # }
//! ```
//!
//! # Settings File Format
//!
//! ```toml
//! [common]
//! database.pool_size = 1
//!
//! [dev]
//! database.uri = "sqlite:///dev.db"
//!
//! [prod]
//! database.uri = "$DATABASE_URL"
//! database.pool_size = 32
//! ```
//!
//! Environment tables are merged over `common` recursively: `dev` above
//! still sees `database.pool_size = 1`.

#![doc(html_root_url = "https://docs.rs/kiln-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod component;
mod error;
mod loader;
mod settings;

pub use component::SettingsComponent;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENVIRONMENT, ENVIRONMENT_VAR};
pub use settings::Settings;
