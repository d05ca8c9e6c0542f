//! Runtime configuration read from `COMPANION_ADMIN_*` environment variables.

use companion_aggregate::DEFAULT_JOIN_TRUNCATE;
use companion_geocode::{DEFAULT_GEOCODE_DELAY_MS, GeocodeConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::is_https_endpoint;

/// Auth endpoint variable.
pub const AUTH_ENDPOINT_VAR: &str = "COMPANION_ADMIN_AUTH_ENDPOINT";
/// Live command delivery endpoint variable.
pub const FUNCTIONS_ENDPOINT_VAR: &str = "COMPANION_ADMIN_FUNCTIONS_ENDPOINT";
/// Trailing trend window variable.
pub const TREND_DAYS_VAR: &str = "COMPANION_ADMIN_TREND_DAYS";
/// Geocoding dispatch delay variable.
pub const GEOCODE_DELAY_VAR: &str = "COMPANION_ADMIN_GEOCODE_DELAY_MS";
/// Fallback id truncation variable.
pub const JOIN_TRUNCATE_VAR: &str = "COMPANION_ADMIN_JOIN_TRUNCATE";
/// Log filter variable.
pub const LOG_FILTER_VAR: &str = "COMPANION_ADMIN_LOG";
/// Device command kill switch variable.
pub const COMMANDS_ENABLED_VAR: &str = "COMPANION_ADMIN_COMMANDS_ENABLED";

/// Dashboard runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTPS auth endpoint.
    pub auth_endpoint: String,
    /// HTTPS endpoint for live device command delivery.
    pub functions_endpoint: String,
    /// Days covered by fixed trailing trends.
    pub trend_days: u32,
    /// Delay between outbound reverse-geocoding lookups.
    pub geocode_delay_ms: u64,
    /// Characters kept from ids that fail to join.
    pub join_truncate: usize,
    /// `tracing` filter directive.
    pub log_filter: String,
    /// Whether device commands may be dispatched.
    pub commands_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth_endpoint: "https://auth.companion.example.org/v1".to_string(),
            functions_endpoint: "https://functions.companion.example.org".to_string(),
            trend_days: 7,
            geocode_delay_ms: DEFAULT_GEOCODE_DELAY_MS,
            join_truncate: DEFAULT_JOIN_TRUNCATE,
            log_filter: "info".to_string(),
            commands_enabled: true,
        }
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults for
    /// unset variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let auth_endpoint = https_var(&lookup, AUTH_ENDPOINT_VAR, defaults.auth_endpoint)?;
        let functions_endpoint =
            https_var(&lookup, FUNCTIONS_ENDPOINT_VAR, defaults.functions_endpoint)?;

        let trend_days: u32 = numeric_var(&lookup, TREND_DAYS_VAR, defaults.trend_days)?;
        if trend_days == 0 {
            return Err(ConfigError::invalid(TREND_DAYS_VAR, "must be greater than zero"));
        }

        let geocode_delay_ms = numeric_var(&lookup, GEOCODE_DELAY_VAR, defaults.geocode_delay_ms)?;
        if geocode_delay_ms == 0 {
            return Err(ConfigError::invalid(GEOCODE_DELAY_VAR, "must be greater than zero"));
        }

        let join_truncate = numeric_var(&lookup, JOIN_TRUNCATE_VAR, defaults.join_truncate)?;
        if join_truncate == 0 {
            return Err(ConfigError::invalid(JOIN_TRUNCATE_VAR, "must be greater than zero"));
        }

        let log_filter = lookup(LOG_FILTER_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.log_filter);

        Ok(Self {
            auth_endpoint,
            functions_endpoint,
            trend_days,
            geocode_delay_ms,
            join_truncate,
            log_filter,
            commands_enabled: switch_enabled(lookup(COMMANDS_ENABLED_VAR).as_deref()),
        })
    }

    /// Pacing for reverse-geocoding batches.
    pub fn geocode(&self) -> GeocodeConfig {
        GeocodeConfig::new(self.geocode_delay_ms).unwrap_or_default()
    }
}

/// Interprets a kill-switch value.
///
/// Unset or any value other than `0`, `false`, `off` (case-insensitive)
/// means enabled.
pub(crate) fn switch_enabled(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            !(normalized == "0" || normalized == "false" || normalized == "off")
        }
        None => true,
    }
}

fn https_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: String,
) -> Result<String, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    let value = value.trim().to_string();
    if !is_https_endpoint(&value) {
        return Err(ConfigError::invalid(name, "must be an absolute https URL"));
    }
    Ok(value)
}

fn numeric_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(name, "must be a non-negative integer")),
        None => Ok(default),
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{variable} {reason}")]
pub struct ConfigError {
    /// Offending variable.
    pub variable: &'static str,
    /// What is wrong with it.
    pub reason: &'static str,
}

impl ConfigError {
    fn invalid(variable: &'static str, reason: &'static str) -> Self {
        Self { variable, reason }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = AppConfig::from_lookup(|_| None).expect("defaults should be valid");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.geocode().delay_ms, 1_100);
    }

    #[test]
    fn zero_trend_window_names_the_variable() {
        let error = AppConfig::from_lookup(lookup_from(&[(TREND_DAYS_VAR, "0")]))
            .expect_err("zero days should be rejected");
        assert_eq!(error.variable, TREND_DAYS_VAR);
    }

    #[test]
    fn kill_switch_values() {
        assert!(switch_enabled(None));
        assert!(switch_enabled(Some("yes")));
        assert!(!switch_enabled(Some(" OFF ")));
        assert!(!switch_enabled(Some("0")));
    }
}
