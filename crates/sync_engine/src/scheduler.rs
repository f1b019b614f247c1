//! Synchronization pass orchestration.

use std::time::Duration;

use chrono::Utc;
use common::config::FetchLimitConfig;
use common::Result;
use openweather_client::{ForecastProvider, RateLimitedFetcher};
use race_store::RaceStore;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dedup::LocationDedup;
use crate::filter::filter_window;
use crate::reconcile::ForecastReconciler;

/// Counters for one completed pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    pub locations_fetched: usize,
    pub races_reconciled: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Result of one timer fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassSummary),
    /// A previous pass was still in flight; this trigger did nothing.
    Skipped,
}

/// Orchestrates one full synchronization pass.
///
/// List active races, dedup by location, fetch under the call budget, filter
/// to each race's window, reconcile. Fail-fast: the first fetch or storage
/// error aborts the remaining pass, keeping whatever earlier locations
/// already committed; the next scheduled pass catches up. A non-reentrant
/// guard keeps a slow pass from overlapping the next timer fire.
pub struct SyncScheduler<P> {
    store: RaceStore,
    provider: P,
    ceiling: u32,
    window: Duration,
    pass_guard: Mutex<()>,
}

impl<P: ForecastProvider> SyncScheduler<P> {
    pub fn new(store: RaceStore, provider: P, limits: &FetchLimitConfig) -> Self {
        Self {
            store,
            provider,
            ceiling: limits.max_calls_per_window,
            window: Duration::from_secs(limits.window_secs),
            pass_guard: Mutex::new(()),
        }
    }

    /// Run one pass.
    ///
    /// The dedup set and fetch budget are built fresh here and discarded at
    /// pass end; nothing is cached across passes.
    ///
    /// # Errors
    /// `Error::Fetch` or `Error::Persistence` on pass abort. Callers driving
    /// the periodic timer log the error and wait for the next tick; nothing
    /// external awaits a pass.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        let Ok(_guard) = self.pass_guard.try_lock() else {
            warn!("Sync pass already in flight; skipping this trigger");
            return Ok(PassOutcome::Skipped);
        };

        let races = self.store.list_active_races(Utc::now())?;
        info!("Sync pass started: {} active races", races.len());

        let mut dedup = LocationDedup::new();
        let mut fetcher = RateLimitedFetcher::new(&self.provider, self.ceiling, self.window);
        let reconciler = ForecastReconciler::new(&self.store);
        let mut summary = PassSummary::default();

        // Locations dispatch in listing order; each distinct location is
        // fetched once and serves every race scheduled there.
        for race in &races {
            if !dedup.needs_fetch(&race.location) {
                continue;
            }

            let payload = fetcher.fetch(&race.location).await?;
            dedup.mark_served(race.location.clone());
            summary.locations_fetched += 1;
            debug!(
                "Fetched ({}, {}): {} steps",
                race.location.lat, race.location.lon, payload.cnt
            );

            for peer in races.iter().filter(|r| r.location == race.location) {
                let samples = filter_window(&payload, peer.start, peer.end);
                let outcome = reconciler.reconcile_one(peer, &samples)?;
                summary.races_reconciled += 1;
                summary.inserted += outcome.inserted;
                summary.updated += outcome.updated;
            }
        }

        info!(
            "Sync pass complete: {} locations fetched, {} races reconciled, {} inserted, {} updated",
            summary.locations_fetched,
            summary.races_reconciled,
            summary.inserted,
            summary.updated
        );
        Ok(PassOutcome::Completed(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use common::{Error, Location};
    use openweather_client::{ConditionTag, ForecastEntry, ForecastResponse, MainReadings};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn limits() -> FetchLimitConfig {
        FetchLimitConfig::default()
    }

    /// Payload with three-hour steps covering `[from, from + 12h]`.
    fn payload_around(from: DateTime<Utc>) -> ForecastResponse {
        let list: Vec<ForecastEntry> = (0..5)
            .map(|i| ForecastEntry {
                dt: (from + ChronoDuration::hours(3 * i)).timestamp(),
                main: MainReadings {
                    temp: 12.0 + i as f64,
                    humidity: 55,
                },
                weather: vec![ConditionTag {
                    description: "clear sky".into(),
                }],
                ..ForecastEntry::default()
            })
            .collect();
        ForecastResponse {
            cod: "200".into(),
            message: 0.0,
            cnt: list.len(),
            list,
        }
    }

    /// Provider stub: counts calls, optionally failing on the n-th.
    struct ScriptedProvider {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        payload_from: DateTime<Utc>,
    }

    impl ScriptedProvider {
        fn new(payload_from: DateTime<Utc>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: None,
                payload_from,
            }
        }

        fn failing_on(payload_from: DateTime<Utc>, call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on_call: Some(call),
                payload_from,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ForecastProvider for ScriptedProvider {
        async fn fetch_forecast(&self, location: &Location) -> common::Result<ForecastResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(Error::Fetch(format!(
                    "simulated outage for ({}, {})",
                    location.lat, location.lon
                )));
            }
            Ok(payload_around(self.payload_from))
        }
    }

    fn seed_race(store: &RaceStore, name: &str, loc: &Location, start: DateTime<Utc>) -> i64 {
        let (id, _) = store
            .create_race(name, loc, start, start + ChronoDuration::hours(12))
            .expect("create race");
        id
    }

    // Two races sharing a location trigger exactly one fetch, and both are
    // reconciled from the same filtered result.
    #[tokio::test]
    async fn shared_location_is_fetched_once_for_all_its_races() {
        let store = RaceStore::open_in_memory().expect("open");
        let start = Utc::now() + ChronoDuration::days(1);
        let shared = Location::new("45.0", "15.0");
        let race_a = seed_race(&store, "A", &shared, start);
        let race_b = seed_race(&store, "B", &shared, start + ChronoDuration::hours(3));

        let provider = ScriptedProvider::new(start);
        let scheduler = SyncScheduler::new(store.clone(), provider, &limits());

        let outcome = scheduler.run_pass().await.expect("pass completes");
        let PassOutcome::Completed(summary) = outcome else {
            panic!("pass must not be skipped");
        };

        assert_eq!(summary.locations_fetched, 1);
        assert_eq!(summary.races_reconciled, 2);
        assert_eq!(scheduler.provider.call_count(), 1);
        assert!(!store.race_forecast(race_a, Utc::now()).expect("A").is_empty());
        assert!(!store.race_forecast(race_b, Utc::now()).expect("B").is_empty());
    }

    // A fetch failure aborts the remaining pass but keeps earlier work.
    #[tokio::test]
    async fn fetch_failure_aborts_the_rest_of_the_pass() {
        let store = RaceStore::open_in_memory().expect("open");
        let start = Utc::now() + ChronoDuration::days(1);
        let mut race_ids = Vec::new();
        for i in 0..5 {
            let loc = Location::new(format!("{}.0", 40 + i), "15.0");
            race_ids.push(seed_race(&store, &format!("race-{i}"), &loc, start));
        }

        let provider = ScriptedProvider::failing_on(start, 2);
        let scheduler = SyncScheduler::new(store.clone(), provider, &limits());

        let err = scheduler.run_pass().await.expect_err("pass must abort");
        assert!(matches!(err, Error::Fetch(_)));

        // Location 1 was reconciled before the outage and stays committed.
        assert!(!store.race_forecast(race_ids[0], Utc::now()).expect("read").is_empty());
        // Locations 2..5: the failed one and the never-fetched rest are empty.
        for id in &race_ids[1..] {
            assert!(store.race_forecast(*id, Utc::now()).expect("read").is_empty());
        }
        // The pass stopped at the failing call; locations 3-5 were never fetched.
        assert_eq!(scheduler.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn a_pass_with_no_active_races_fetches_nothing() {
        let store = RaceStore::open_in_memory().expect("open");
        let provider = ScriptedProvider::new(Utc::now());
        let scheduler = SyncScheduler::new(store, provider, &limits());

        let outcome = scheduler.run_pass().await.expect("pass completes");
        assert_eq!(outcome, PassOutcome::Completed(PassSummary::default()));
        assert_eq!(scheduler.provider.call_count(), 0);
    }

    // A slow pass still in flight makes the next trigger a no-op.
    #[tokio::test]
    async fn overlapping_triggers_are_skipped() {
        /// Provider that parks until released, holding its pass open.
        struct GatedProvider {
            gate: tokio::sync::Semaphore,
            entered: tokio::sync::Notify,
        }

        #[async_trait]
        impl ForecastProvider for GatedProvider {
            async fn fetch_forecast(&self, _: &Location) -> common::Result<ForecastResponse> {
                self.entered.notify_one();
                let _permit = self.gate.acquire().await.map_err(|_| {
                    Error::Fetch("gate closed".into())
                })?;
                Ok(ForecastResponse::default())
            }
        }

        let store = RaceStore::open_in_memory().expect("open");
        let start = Utc::now() + ChronoDuration::days(1);
        seed_race(&store, "A", &Location::new("45.0", "15.0"), start);

        let provider = GatedProvider {
            gate: tokio::sync::Semaphore::new(0),
            entered: tokio::sync::Notify::new(),
        };
        let scheduler = Arc::new(SyncScheduler::new(store, provider, &limits()));

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run_pass().await })
        };

        // Wait until the first pass is provably inside its fetch.
        scheduler.provider.entered.notified().await;

        let second = scheduler.run_pass().await.expect("skip is not an error");
        assert_eq!(second, PassOutcome::Skipped);

        scheduler.provider.gate.add_permits(1);
        let first = first.await.expect("join").expect("first pass completes");
        assert!(matches!(first, PassOutcome::Completed(_)));
    }
}
