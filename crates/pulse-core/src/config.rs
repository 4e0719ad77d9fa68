use std::str::FromStr;
use std::time::Duration;

use crate::app_config::{AppConfig, Environment};
use crate::policy::{
    PollerPolicy, RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_CONCURRENCY, DEFAULT_LOW_WATER_MARK,
    DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL,
};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: String| -> String { lookup(var).unwrap_or(default) };

    let api_base_url = require("PULSE_API_BASE_URL")?;
    let api_key = lookup("PULSE_API_KEY").ok();

    let env = parse_environment(&or_default("PULSE_ENV", "development".to_string()));
    let log_level = or_default("PULSE_LOG_LEVEL", "info".to_string());

    let request_timeout_secs = parse_number(
        "PULSE_REQUEST_TIMEOUT_SECS",
        &or_default("PULSE_REQUEST_TIMEOUT_SECS", "30".to_string()),
    )?;
    let user_agent = or_default("PULSE_USER_AGENT", "pulse/0.1 (market-watch)".to_string());

    let low_water_mark = parse_number(
        "PULSE_RATE_LIMIT_LOW_WATER_MARK",
        &or_default(
            "PULSE_RATE_LIMIT_LOW_WATER_MARK",
            DEFAULT_LOW_WATER_MARK.to_string(),
        ),
    )?;
    let concurrency: usize = parse_positive(
        "PULSE_POLL_CONCURRENCY",
        &or_default("PULSE_POLL_CONCURRENCY", DEFAULT_CONCURRENCY.to_string()),
    )?;
    let poll_interval_secs: u64 = parse_positive(
        "PULSE_POLL_INTERVAL_SECS",
        &or_default(
            "PULSE_POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL.as_secs().to_string(),
        ),
    )?;

    let max_retries = parse_number(
        "PULSE_RETRY_MAX_RETRIES",
        &or_default("PULSE_RETRY_MAX_RETRIES", DEFAULT_MAX_RETRIES.to_string()),
    )?;
    let base_delay_ms = parse_number(
        "PULSE_RETRY_BASE_DELAY_MS",
        &or_default("PULSE_RETRY_BASE_DELAY_MS", DEFAULT_BASE_DELAY_MS.to_string()),
    )?;
    let max_delay_ms = parse_number(
        "PULSE_RETRY_MAX_DELAY_MS",
        &or_default("PULSE_RETRY_MAX_DELAY_MS", DEFAULT_MAX_DELAY_MS.to_string()),
    )?;

    Ok(AppConfig {
        env,
        log_level,
        api_base_url,
        api_key,
        request_timeout_secs,
        user_agent,
        poller: PollerPolicy {
            low_water_mark,
            concurrency,
            poll_interval: Duration::from_secs(poll_interval_secs),
        },
        retry: RetryPolicy {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        },
    })
}

fn parse_number<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

/// Like [`parse_number`] but rejects zero.
fn parse_positive<T>(var: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let value = parse_number::<T>(var, raw)?;
    if value == T::default() {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
