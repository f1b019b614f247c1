//! Service configuration types.

use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// OpenWeather API key.
    #[serde(default)]
    pub api_key: String,

    /// Provider base URL. Overridable for tests against a mock server.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Unit system passed to the provider ("metric", "imperial", "standard").
    #[serde(default = "default_units")]
    pub units: String,

    /// Language code passed to the provider.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Provider call budget.
    #[serde(default)]
    pub limits: FetchLimitConfig,

    /// Periodic task cadence.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Optional race-window business rules.
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Self-imposed provider call budget.
///
/// The ceiling sits below the provider's published per-minute quota to leave
/// headroom for other consumers sharing the same credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchLimitConfig {
    /// Max provider calls within one window.
    #[serde(default = "default_ceiling")]
    pub max_calls_per_window: u32,

    /// Window length in seconds; also the cooldown slept when the ceiling
    /// is reached.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

/// Timing configuration (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Forecast synchronization pass interval.
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Expired-forecast cleanup interval.
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

/// Optional race-window scheduling rules.
///
/// Both rules existed in one historical variant of the validation logic and
/// not in another; deployments opt in explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Races must start and end on the same Saturday or Sunday.
    #[serde(default)]
    pub enforce_weekend_only: bool,

    /// Races must start and end between 09:00 and 18:59.
    #[serde(default)]
    pub enforce_business_hours: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://api.openweathermap.org".into()
}

fn default_units() -> String {
    "metric".into()
}

fn default_lang() -> String {
    "en".into()
}

fn default_db_path() -> String {
    "race-weather.db".into()
}

fn default_ceiling() -> u32 {
    45
}

fn default_window_secs() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    2
}

fn default_sync_interval() -> u64 {
    6 * 60 * 60
}

fn default_reap_interval() -> u64 {
    60 * 60
}

impl Default for FetchLimitConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: default_ceiling(),
            window_secs: default_window_secs(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            units: default_units(),
            lang: default_lang(),
            db_path: default_db_path(),
            limits: FetchLimitConfig::default(),
            timing: TimingConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}
