//! Layered settings: built-in defaults, then an optional TOML file, then
//! `CNOPS_*` environment variables.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use cnops_client::{ApiClient, ClientError, Session};

use crate::app::SessionOptions;
use crate::data::FallbackPolicy;

pub const DEFAULT_API_BASE: &str = "http://localhost:5000";
pub const ENV_PREFIX: &str = "CNOPS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid api_base `{0}`: expected an http:// or https:// URL")]
    InvalidEndpoint(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub api_base: String,
    #[serde(default)]
    pub token: Option<String>,
    pub poll_interval_ms: u64,
    pub revert_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub fallback_policy: FallbackPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            poll_interval_ms: 10_000,
            revert_delay_ms: 2_000,
            request_timeout_ms: 10_000,
            fallback_policy: FallbackPolicy::ResetToDefault,
        }
    }
}

impl Settings {
    /// Load settings, reading `path` if given and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings with an explicit environment source.
    pub fn load_from(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("api_base", defaults.api_base)?
            .set_default("poll_interval_ms", defaults.poll_interval_ms as i64)?
            .set_default("revert_delay_ms", defaults.revert_delay_ms as i64)?
            .set_default("request_timeout_ms", defaults.request_timeout_ms as i64)?
            .set_default("fallback_policy", "reset_to_default")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Zero("request_timeout_ms"));
        }
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.api_base.clone()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn revert_delay(&self) -> Duration {
        Duration::from_millis(self.revert_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            poll_interval: self.poll_interval(),
            revert_delay: self.revert_delay(),
            fallback_policy: self.fallback_policy,
        }
    }

    pub fn session(&self) -> Session {
        match &self.token {
            Some(token) if !token.is_empty() => Session::bearer(token.clone()),
            _ => Session::anonymous(),
        }
    }

    /// An API client for `api_base` carrying the configured token.
    pub fn client(&self) -> Result<ApiClient, ClientError> {
        ApiClient::builder()
            .endpoint(self.api_base.clone())
            .session(self.session())
            .timeout(self.request_timeout())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(None, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert!(!settings.session().is_authenticated());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
api_base = "http://ops.internal:5000"
poll_interval_ms = 2500
fallback_policy = "retain_last_good"
"#,
        );

        let settings = Settings::load_from(Some(file.path()), env(&[])).unwrap();
        assert_eq!(settings.api_base, "http://ops.internal:5000");
        assert_eq!(settings.poll_interval_ms, 2500);
        assert_eq!(settings.revert_delay_ms, 2000);
        assert_eq!(settings.fallback_policy, FallbackPolicy::RetainLastGood);
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("poll_interval_ms = 2500\n");

        let settings = Settings::load_from(
            Some(file.path()),
            env(&[("CNOPS_POLL_INTERVAL_MS", "500"), ("CNOPS_TOKEN", "abc")]),
        )
        .unwrap();
        assert_eq!(settings.poll_interval_ms, 500);
        assert_eq!(settings.session().token(), Some("abc"));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let file = toml_file("poll_interval_ms = 0\n");
        let err = Settings::load_from(Some(file.path()), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Zero("poll_interval_ms")));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(Some(&dir.path().join("absent.toml")), env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_session_options() {
        let settings = Settings {
            revert_delay_ms: 500,
            ..Settings::default()
        };
        let options = settings.session_options();
        assert_eq!(options.revert_delay, Duration::from_millis(500));
        assert_eq!(options.poll_interval, Duration::from_secs(10));
    }
}
