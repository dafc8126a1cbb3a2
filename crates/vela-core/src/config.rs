//! Harness and host configuration.
//!
//! Configuration is validated at load time with sensible defaults and clear
//! error messages. A host file looks like:
//!
//! ```toml
//! name = "template-host"
//! shutdown_timeout = "30s"
//!
//! [services.template]
//! loop_iteration_delay_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{HarnessError, Result};

/// Default pause between loop iterations, in milliseconds.
pub const DEFAULT_LOOP_ITERATION_DELAY_MS: i64 = 3000;

/// Per-service harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Milliseconds between loop iterations. Must not be negative.
    #[serde(default = "default_loop_iteration_delay_ms")]
    pub loop_iteration_delay_ms: i64,
}

fn default_loop_iteration_delay_ms() -> i64 {
    DEFAULT_LOOP_ITERATION_DELAY_MS
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            loop_iteration_delay_ms: DEFAULT_LOOP_ITERATION_DELAY_MS,
        }
    }
}

impl HarnessConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the loop iteration delay in milliseconds.
    #[must_use]
    pub const fn with_loop_iteration_delay_ms(mut self, millis: i64) -> Self {
        self.loop_iteration_delay_ms = millis;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.loop_iteration_delay_ms < 0 {
            return Err(HarnessError::config(format!(
                "loop_iteration_delay_ms must not be negative (got {})",
                self.loop_iteration_delay_ms
            )));
        }
        Ok(())
    }

    /// Returns the loop iteration delay as a [`Duration`].
    pub fn loop_iteration_delay(&self) -> Result<Duration> {
        delay_from_millis(self.loop_iteration_delay_ms)
    }
}

/// Converts a millisecond count into a delay, rejecting negatives.
pub(crate) fn delay_from_millis(millis: i64) -> Result<Duration> {
    u64::try_from(millis)
        .map(Duration::from_millis)
        .map_err(|_| {
            HarnessError::config(format!(
                "loop iteration delay must not be negative (got {millis} ms)"
            ))
        })
}

/// Host configuration: identity, shutdown bound and per-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name (must be a valid identifier).
    pub name: String,

    /// How long to wait for services to stop once shutdown starts.
    #[serde(default = "default_shutdown_timeout")]
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Per-service settings keyed by service name.
    #[serde(default)]
    pub services: HashMap<String, HarnessConfig>,
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

impl HostConfig {
    /// Creates a host configuration with defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shutdown_timeout: default_shutdown_timeout(),
            services: HashMap::new(),
        }
    }

    /// Sets the shutdown timeout.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Adds settings for the named service.
    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>, config: HarnessConfig) -> Self {
        self.services.insert(name.into(), config);
        self
    }

    /// Returns the settings for a service, or defaults if none are configured.
    #[must_use]
    pub fn service(&self, name: &str) -> HarnessConfig {
        self.services.get(name).cloned().unwrap_or_default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error for a malformed host name or an invalid service entry.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(HarnessError::config("name cannot be empty"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(HarnessError::config(
                "name must contain only alphanumeric characters, hyphens, and underscores",
            ));
        }

        for (service, config) in &self.services {
            config
                .validate()
                .map_err(|e| HarnessError::config(format!("service '{service}': {e}")))?;
        }

        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HarnessError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns [`HarnessError::Io`] if the file cannot be read, or a
    /// configuration error if its contents are invalid.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_config_default() {
        let config = HarnessConfig::new();
        assert_eq!(config.loop_iteration_delay_ms, 3000);
        assert_eq!(
            config.loop_iteration_delay().unwrap(),
            Duration::from_millis(3000)
        );
    }

    #[test]
    fn test_harness_config_rejects_negative() {
        let config = HarnessConfig::new().with_loop_iteration_delay_ms(-1);
        assert!(config.validate().is_err());
        assert!(config.loop_iteration_delay().is_err());
    }

    #[test]
    fn test_harness_config_zero_allowed() {
        let config = HarnessConfig::new().with_loop_iteration_delay_ms(0);
        assert!(config.validate().is_ok());
        assert_eq!(config.loop_iteration_delay().unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_host_config_defaults() {
        let config = HostConfig::new("host");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert!(config.services.is_empty());
        assert_eq!(config.service("anything"), HarnessConfig::default());
    }

    #[test]
    fn test_host_config_validate_name() {
        assert!(HostConfig::new("").validate().is_err());
        assert!(HostConfig::new("bad name!").validate().is_err());
        assert!(HostConfig::new("good-name_1").validate().is_ok());
    }

    #[test]
    fn test_host_config_validate_services() {
        let config = HostConfig::new("host").with_service(
            "template",
            HarnessConfig::new().with_loop_iteration_delay_ms(-50),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("template"));
    }

    #[test]
    fn test_host_config_from_toml() {
        let config = HostConfig::from_toml_str(
            r#"
            name = "template-host"
            shutdown_timeout = "5s"

            [services.template]
            loop_iteration_delay_ms = 10000
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "template-host");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(config.service("template").loop_iteration_delay_ms, 10000);
        assert_eq!(config.service("other").loop_iteration_delay_ms, 3000);
    }

    #[test]
    fn test_host_config_toml_defaults() {
        let config = HostConfig::from_toml_str("name = \"h\"\n[services.a]\n").unwrap();
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(config.service("a").loop_iteration_delay_ms, 3000);
    }

    #[test]
    fn test_host_config_toml_negative_delay_rejected() {
        let result =
            HostConfig::from_toml_str("name = \"h\"\n[services.a]\nloop_iteration_delay_ms = -5\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_host_config_toml_bad_duration() {
        let result = HostConfig::from_toml_str("name = \"h\"\nshutdown_timeout = \"soon\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = HostConfig::load("/nonexistent/vela/host.toml");
        assert!(matches!(result, Err(HarnessError::Io(_))));
    }

    #[test]
    fn test_load_reads_file() {
        let path = std::env::temp_dir().join(format!("vela-host-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "name = \"from-file\"\n\n[services.worker]\nloop_iteration_delay_ms = 40\n",
        )
        .unwrap();

        let result = HostConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = result.unwrap();
        assert_eq!(config.name, "from-file");
        assert_eq!(config.service("worker").loop_iteration_delay_ms, 40);
    }
}
