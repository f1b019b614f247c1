//! Configuration loader — merges env vars, .env file, and config.toml.

use common::config::ServiceConfig;
use common::Error;
use std::path::Path;

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    let parsed = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &ServiceConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.db_path.trim().is_empty() {
        issues.push("db_path must not be empty".into());
    }
    if !matches!(config.units.as_str(), "metric" | "imperial" | "standard") {
        issues.push("units must be one of: metric, imperial, standard".into());
    }
    if config.lang.trim().is_empty() {
        issues.push("lang must not be empty".into());
    }

    if config.limits.max_calls_per_window == 0 {
        issues.push("limits.max_calls_per_window must be > 0".into());
    }
    if config.limits.window_secs == 0 {
        issues.push("limits.window_secs must be > 0".into());
    }
    if config.limits.http_timeout_secs == 0 {
        issues.push("limits.http_timeout_secs must be > 0".into());
    }

    if config.timing.sync_interval_secs == 0 {
        issues.push("timing.sync_interval_secs must be > 0".into());
    }
    if config.timing.reap_interval_secs == 0 {
        issues.push("timing.reap_interval_secs must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load service configuration from environment and optional config file.
pub fn load_config() -> Result<ServiceConfig, Error> {
    // 1. Load .env file if one is present.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = ServiceConfig::default();

    // 3. Try loading config.toml if it exists.
    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
        config.api_key = key;
    }
    if let Ok(url) = std::env::var("OPENWEATHER_BASE_URL") {
        config.base_url = url;
    }
    if let Ok(units) = std::env::var("WEATHER_UNITS") {
        config.units = units;
    }
    if let Ok(lang) = std::env::var("WEATHER_LANG") {
        config.lang = lang;
    }
    if let Ok(path) = std::env::var("RACE_DB_PATH") {
        config.db_path = path;
    }
    if let Ok(raw) = std::env::var("FETCH_CEILING") {
        config.limits.max_calls_per_window = parse_positive_u32(&raw, "FETCH_CEILING")?;
    }
    if let Ok(raw) = std::env::var("FETCH_WINDOW_SECS") {
        config.limits.window_secs = parse_positive_u64(&raw, "FETCH_WINDOW_SECS")?;
    }
    if let Ok(raw) = std::env::var("HTTP_TIMEOUT_SECS") {
        config.limits.http_timeout_secs = parse_positive_u64(&raw, "HTTP_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("SYNC_INTERVAL_SECS") {
        config.timing.sync_interval_secs = parse_positive_u64(&raw, "SYNC_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("REAP_INTERVAL_SECS") {
        config.timing.reap_interval_secs = parse_positive_u64(&raw, "REAP_INTERVAL_SECS")?;
    }
    if let Ok(raw) = std::env::var("ENFORCE_WEEKEND_ONLY") {
        config.validation.enforce_weekend_only = parse_bool(&raw);
    }
    if let Ok(raw) = std::env::var("ENFORCE_BUSINESS_HOURS") {
        config.validation.enforce_business_hours = parse_bool(&raw);
    }

    // 5. Validate required fields.
    if config.api_key.is_empty() {
        return Err(Error::Config(
            "OPENWEATHER_API_KEY is required (set in .env or environment)".into(),
        ));
    }

    validate_config(&config)?;

    Ok(config)
}
