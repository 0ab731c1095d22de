//! `rolevault-config` — process configuration loading.
//!
//! Deployments describe the HTTP front end, cookie/JWT settings and the SQL
//! connection string in one YAML file. `${VAR}` references in any string
//! value are expanded from the environment before deserialization; unknown
//! variables are left untouched. Expiry fields are ISO 8601 durations.
//!
//! This crate only *carries* the token/cookie settings for the surrounding
//! layers; token cryptography itself lives elsewhere.

pub mod duration;

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub use duration::parse_duration;

/// Configuration loading failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unable to convert {0:?} to a duration")]
    InvalidDuration(String),
}

/// Top-level process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cookie: CookieConfig,
    pub jwt: JwtConfig,
    pub sql: SqlConfig,
    /// Opaque logging configuration, passed through to the process bootstrap.
    #[serde(default)]
    pub log: Option<serde_yaml::Value>,
}

/// HTTP front-end settings (consumed by the external server layer).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    pub path_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    #[serde(deserialize_with = "deserialize_flag")]
    pub is_enabled: bool,
    #[serde(default)]
    pub certfile: Option<String>,
    #[serde(default)]
    pub keyfile: Option<String>,
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub domain: String,
    pub path: String,
    #[serde(deserialize_with = "duration::deserialize_iso8601")]
    pub expiry: chrono::Duration,
}

/// Token issuance settings (the secret is carried, never used, here).
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    #[serde(deserialize_with = "duration::deserialize_iso8601")]
    pub expiry: chrono::Duration,
}

/// Backing store settings: a single connection string.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlConfig {
    pub url: String,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` references.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(text)?;
        expand_env(&mut value);

        let mut config: Config = serde_yaml::from_value(value)?;
        if let Some(tls) = config.app.tls.as_mut() {
            tls.certfile = tls.certfile.take().map(expand_tilde);
            tls.keyfile = tls.keyfile.take().map(expand_tilde);
        }
        Ok(config)
    }
}

/// Expand `${VAR}` in every string value, recursively. Unknown variables are
/// left as written.
fn expand_env(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::String(text) => {
            *text = shellexpand::env_with_context_no_errors(text, |var| std::env::var(var).ok())
                .into_owned();
        }
        serde_yaml::Value::Sequence(items) => items.iter_mut().for_each(expand_env),
        serde_yaml::Value::Mapping(map) => {
            map.iter_mut().for_each(|(_, item)| expand_env(item));
        }
        _ => {}
    }
}

fn expand_tilde(path: String) -> String {
    shellexpand::tilde(&path).into_owned()
}

/// Accept either a YAML boolean or the string `"true"`/`"false"`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => flag,
        Flag::Text(text) => text == "true",
    })
}
