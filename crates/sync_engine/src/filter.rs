//! Window filter over raw provider payloads.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use common::ForecastSample;
use openweather_client::ForecastResponse;
use std::collections::HashSet;
use tracing::debug;

/// The provider emits an unreliable edge sample at this hour-of-day (UTC)
/// where its three-hour cadence crosses a day boundary; such entries are
/// dropped rather than stored.
const ARTIFACT_HOUR: u32 = 21;

/// Select the forecast steps a race actually needs.
///
/// Keeps entries with `start <= t <= end` (inclusive on both ends), drops the
/// hour-21 cadence artifact, and skips malformed entries instead of failing:
/// a partial provider payload should still yield partial usable data. Output
/// preserves the provider's chronological ordering; a duplicated timestamp is
/// emitted once (first occurrence wins).
///
/// `cnt` is the provider's authoritative count of entries in `list`.
pub fn filter_window(
    payload: &ForecastResponse,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<ForecastSample> {
    let count = payload.cnt.min(payload.list.len());
    let mut seen = HashSet::new();
    let mut samples = Vec::new();

    for entry in &payload.list[..count] {
        let Some(t) = Utc.timestamp_opt(entry.dt, 0).single() else {
            debug!("Skipping forecast entry with unrepresentable dt {}", entry.dt);
            continue;
        };
        let Some(condition) = entry.weather.first() else {
            debug!("Skipping forecast entry at {t} with no condition data");
            continue;
        };

        if t < start || t > end || t.hour() == ARTIFACT_HOUR {
            continue;
        }
        if !seen.insert(entry.dt) {
            continue;
        }

        samples.push(ForecastSample {
            forecast_time: t,
            temperature: entry.main.temp,
            humidity: entry.main.humidity,
            wind_speed: entry.wind.speed,
            rain_3h: entry.rain.volume,
            snow_3h: entry.snow.volume,
            condition_icon: condition.description.clone(),
        });
    }

    samples
}
