//! Expired-forecast cleanup.

use chrono::{DateTime, Utc};
use common::Result;
use race_store::RaceStore;
use tracing::info;

/// Periodic deletion of forecast rows whose time has passed.
///
/// Runs on its own timer and does not coordinate with the sync pass; a
/// just-fetched sample expiring mid-reap is resolved by the next pass.
pub struct ExpiryReaper {
    store: RaceStore,
}

impl ExpiryReaper {
    pub fn new(store: RaceStore) -> Self {
        Self { store }
    }

    /// Delete every forecast row strictly before `now`. Returns the count.
    pub fn reap(&self, now: DateTime<Utc>) -> Result<usize> {
        let deleted = self.store.delete_expired(now)?;
        if deleted > 0 {
            info!("Reaped {} expired forecast rows", deleted);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{ForecastSample, Location};

    fn sample_at(dt: DateTime<Utc>) -> ForecastSample {
        ForecastSample {
            forecast_time: dt,
            temperature: 10.0,
            humidity: 50,
            wind_speed: 1.0,
            rain_3h: 0.0,
            snow_3h: 0.0,
            condition_icon: "mist".into(),
        }
    }

    #[test]
    fn reap_deletes_past_rows_and_keeps_future_ones() {
        let store = RaceStore::open_in_memory().expect("open");
        let now = Utc::now();
        let (race_id, location_id) = store
            .create_race(
                "Run",
                &Location::new("45.0", "15.0"),
                now + Duration::hours(1),
                now + Duration::hours(7),
            )
            .expect("create");

        store
            .insert_samples(
                location_id,
                &[
                    sample_at(now - Duration::hours(3)),
                    sample_at(now + Duration::hours(3)),
                ],
            )
            .expect("insert");

        let reaper = ExpiryReaper::new(store.clone());
        assert_eq!(reaper.reap(now).expect("reap"), 1);
        assert_eq!(reaper.reap(now).expect("reap again"), 0);

        let remaining = store.race_forecast(race_id, now).expect("read");
        assert_eq!(remaining.len(), 1);
    }
}
