//! Layered configuration loading: defaults, then an optional TOML file,
//! then `VIDPACE_*` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use thiserror::Error;
use tracing::{debug, info};

use crate::models::{ConfigSource, FileConfig, KeyBindings, VidpaceConfig};
use crate::validation;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("configuration rejected: {0}")]
    Validation(String),
}

/// Builder for [`VidpaceConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    load_dotenv: bool,
    env_overrides: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub const ENV_PREFIX: &'static str = "VIDPACE_";

    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a TOML file on top of the defaults.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Loads `.env` from the working directory before reading variables.
    pub fn with_dotenv(mut self, enabled: bool) -> Self {
        self.load_dotenv = enabled;
        self
    }

    /// Replaces the process environment with a fixed map.
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env_overrides = Some(vars);
        self
    }

    pub fn load(&self) -> Result<VidpaceConfig, ConfigLoadError> {
        if self.load_dotenv {
            match dotenvy::dotenv() {
                Ok(path) => info!("loaded .env file from {}", path.display()),
                Err(err) if err.not_found() => debug!("no .env file found"),
                Err(err) => return Err(err.into()),
            }
        }

        let mut config = VidpaceConfig::default();
        if let Some(path) = &self.file {
            let file = read_file_config(path)?;
            apply_file(&mut config, file)?;
            config.source = ConfigSource::File(path.clone());
        }
        self.apply_env(&mut config)?;

        validation::validate(&config)?;
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<String> {
        let key = format!("{}{name}", Self::ENV_PREFIX);
        let value = match &self.env_overrides {
            Some(vars) => vars.get(&key).cloned(),
            None => env::var(&key).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    fn apply_env(&self, config: &mut VidpaceConfig) -> Result<(), ConfigLoadError> {
        if let Some(raw) = self.var("SCHEMA_VERSION") {
            config.schema_version = parse_number("VIDPACE_SCHEMA_VERSION", &raw)?;
        }
        if let Some(raw) = self.var("FEEDBACK_INTERVAL") {
            config.feedback_interval =
                parse_interval("VIDPACE_FEEDBACK_INTERVAL", &raw)?;
        }
        if let Some(raw) = self.var("NOTIFICATION_INTERVAL") {
            config.notification_interval =
                parse_interval("VIDPACE_NOTIFICATION_INTERVAL", &raw)?;
        }
        if let Some(raw) = self.var("KEY_BINDINGS") {
            config.key_bindings = KeyBindings::from_compact(&raw).ok_or_else(|| {
                ConfigLoadError::InvalidValue {
                    key: "VIDPACE_KEY_BINDINGS".into(),
                    message: format!("expected four keys like \"zxcv\", got {raw:?}"),
                }
            })?;
        }
        if let Some(raw) = self.var("SPEED_PRESETS") {
            config.speed_presets = raw
                .split(',')
                .map(|part| parse_number("VIDPACE_SPEED_PRESETS", part))
                .collect::<Result<_, _>>()?;
        }
        if let Some(raw) = self.var("UI_LOCALE") {
            config.ui_locale = raw.trim().to_string();
        }
        if let Some(raw) = self.var("STORE_PATH") {
            config.store_path = PathBuf::from(raw.trim());
        }
        if let Some(raw) = self.var("CHANNEL_CAPACITY") {
            config.channel_capacity =
                parse_number("VIDPACE_CHANNEL_CAPACITY", &raw)?;
        }
        Ok(())
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_file(config: &mut VidpaceConfig, file: FileConfig) -> Result<(), ConfigLoadError> {
    if let Some(version) = file.schema_version {
        config.schema_version = version;
    }
    if let Some(raw) = file.feedback_interval {
        config.feedback_interval = parse_interval("feedback_interval", &raw)?;
    }
    if let Some(raw) = file.notification_interval {
        config.notification_interval = parse_interval("notification_interval", &raw)?;
    }
    if let Some(bindings) = file.key_bindings {
        config.key_bindings = bindings;
    }
    if let Some(presets) = file.speed_presets {
        config.speed_presets = presets;
    }
    if let Some(locale) = file.ui_locale {
        config.ui_locale = locale;
    }
    if let Some(path) = file.store_path {
        config.store_path = path;
    }
    if let Some(capacity) = file.channel_capacity {
        config.channel_capacity = capacity;
    }
    Ok(())
}

fn parse_interval(key: &str, raw: &str) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|err| ConfigLoadError::InvalidValue {
        key: key.to_string(),
        message: err.to_string(),
    })
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ConfigLoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigLoadError::InvalidValue {
        key: key.to_string(),
        message: err.to_string(),
    })
}
