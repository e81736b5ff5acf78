//! Layered configuration: built-in defaults, then an optional
//! `config/default.{toml,yaml,json}` file, then `COURSEFEED_*` environment
//! variables (`COURSEFEED_SERVER_PORT`, `COURSEFEED_FEED_CAPACITY`, ...).

mod settings;

use config::{Config, Environment, File};

use crate::utils::error::Result;

pub use settings::{
    FeedSettings, LogSettings, PartialSettings, ServerSettings, Settings,
};

pub const DEFAULT_CONFIG_FILE: &str = "config/default";
pub const ENV_PREFIX: &str = "COURSEFEED";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings> {
    load_config_from(DEFAULT_CONFIG_FILE)
}

/// Same as `load_config`, reading the optional file at `path` (extension optional).
pub fn load_config_from(path: &str) -> Result<Settings> {
    let config = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("_")
                .try_parsing(true),
        )
        .build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_with_defaults())
}
