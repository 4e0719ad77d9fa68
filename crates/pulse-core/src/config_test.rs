use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

/// Returns a map with all required env vars populated with valid defaults.
fn full_env<'a>() -> HashMap<&'a str, &'a str> {
    let mut m = HashMap::new();
    m.insert("PULSE_API_BASE_URL", "https://api.example.test/v1");
    m
}

#[test]
fn parse_environment_development() {
    assert_eq!(parse_environment("development"), Environment::Development);
}

#[test]
fn parse_environment_production() {
    assert_eq!(parse_environment("production"), Environment::Production);
}

#[test]
fn parse_environment_unknown_defaults_to_development() {
    assert_eq!(parse_environment("staging"), Environment::Development);
}

#[test]
fn build_app_config_fails_without_api_base_url() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "PULSE_API_BASE_URL"),
        "expected MissingEnvVar(PULSE_API_BASE_URL), got: {result:?}"
    );
}

#[test]
fn build_app_config_succeeds_with_all_required_vars() {
    let map = full_env();
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let cfg = result.unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.api_base_url, "https://api.example.test/v1");
    assert!(cfg.api_key.is_none());
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.request_timeout_secs, 30);
    assert_eq!(cfg.user_agent, "pulse/0.1 (market-watch)");
    assert_eq!(cfg.poller, PollerPolicy::default());
    assert_eq!(cfg.retry, RetryPolicy::default());
}

#[test]
fn api_key_is_redacted_in_debug_output() {
    let mut map = full_env();
    map.insert("PULSE_API_KEY", "super-secret-key");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.api_key.as_deref(), Some("super-secret-key"));
    let debug = format!("{cfg:?}");
    assert!(!debug.contains("super-secret-key"), "leaked key: {debug}");
    assert!(debug.contains("[redacted]"));
}

#[test]
fn low_water_mark_override() {
    let mut map = full_env();
    map.insert("PULSE_RATE_LIMIT_LOW_WATER_MARK", "25");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.poller.low_water_mark, 25);
}

#[test]
fn low_water_mark_invalid() {
    let mut map = full_env();
    map.insert("PULSE_RATE_LIMIT_LOW_WATER_MARK", "-1");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PULSE_RATE_LIMIT_LOW_WATER_MARK"),
        "expected InvalidEnvVar(PULSE_RATE_LIMIT_LOW_WATER_MARK), got: {result:?}"
    );
}

#[test]
fn poll_concurrency_override() {
    let mut map = full_env();
    map.insert("PULSE_POLL_CONCURRENCY", "8");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.poller.concurrency, 8);
}

#[test]
fn poll_concurrency_zero_is_rejected() {
    let mut map = full_env();
    map.insert("PULSE_POLL_CONCURRENCY", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PULSE_POLL_CONCURRENCY"),
        "expected InvalidEnvVar(PULSE_POLL_CONCURRENCY), got: {result:?}"
    );
}

#[test]
fn poll_interval_override() {
    let mut map = full_env();
    map.insert("PULSE_POLL_INTERVAL_SECS", "15");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.poller.poll_interval, Duration::from_secs(15));
}

#[test]
fn poll_interval_zero_is_rejected() {
    let mut map = full_env();
    map.insert("PULSE_POLL_INTERVAL_SECS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PULSE_POLL_INTERVAL_SECS"),
        "expected InvalidEnvVar(PULSE_POLL_INTERVAL_SECS), got: {result:?}"
    );
}

#[test]
fn retry_overrides() {
    let mut map = full_env();
    map.insert("PULSE_RETRY_MAX_RETRIES", "5");
    map.insert("PULSE_RETRY_BASE_DELAY_MS", "250");
    map.insert("PULSE_RETRY_MAX_DELAY_MS", "4000");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(
        cfg.retry,
        RetryPolicy {
            max_retries: 5,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
        }
    );
}

#[test]
fn retry_max_retries_invalid() {
    let mut map = full_env();
    map.insert("PULSE_RETRY_MAX_RETRIES", "not-a-number");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PULSE_RETRY_MAX_RETRIES"),
        "expected InvalidEnvVar(PULSE_RETRY_MAX_RETRIES), got: {result:?}"
    );
}

#[test]
fn request_timeout_invalid() {
    let mut map = full_env();
    map.insert("PULSE_REQUEST_TIMEOUT_SECS", "soon");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PULSE_REQUEST_TIMEOUT_SECS"),
        "expected InvalidEnvVar(PULSE_REQUEST_TIMEOUT_SECS), got: {result:?}"
    );
}
