//! Reconciliation of filtered samples into storage.

use common::{ForecastSample, RaceWindow, Result};
use race_store::RaceStore;
use tracing::debug;

/// Row counts from one reconciliation call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub updated: usize,
}

impl ReconcileOutcome {
    fn absorb(&mut self, other: ReconcileOutcome) {
        self.inserted += other.inserted;
        self.updated += other.updated;
    }
}

/// Merges fresh samples into storage without duplicating rows.
///
/// A location with no stored forecast gets a conflict-ignoring bulk insert;
/// a location that already has rows gets per-timestamp updates, with samples
/// matching no stored row inserted as new rows so a widened race window still
/// reaches full coverage. Reconciliation per race is independent: a failure
/// partway leaves earlier races' rows committed (no cross-race transaction).
pub struct ForecastReconciler<'a> {
    store: &'a RaceStore,
}

impl<'a> ForecastReconciler<'a> {
    pub fn new(store: &'a RaceStore) -> Self {
        Self { store }
    }

    /// Reconcile every race in the batch against the same sample set.
    ///
    /// # Errors
    /// `Error::Persistence` on the first storage failure; earlier races'
    /// writes stay committed.
    pub fn reconcile(
        &self,
        races: &[RaceWindow],
        samples: &[ForecastSample],
    ) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();
        for race in races {
            outcome.absorb(self.reconcile_one(race, samples)?);
        }
        Ok(outcome)
    }

    /// Single-race reconciliation, also used right after a race is created or
    /// updated by the CRUD layer.
    pub fn reconcile_one(
        &self,
        race: &RaceWindow,
        samples: &[ForecastSample],
    ) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        if !self.store.has_forecast_rows(race.location_id)? {
            outcome.inserted = self.store.insert_samples(race.location_id, samples)?;
        } else {
            for sample in samples {
                if self.store.update_sample(race.location_id, sample)? {
                    outcome.updated += 1;
                } else {
                    outcome.inserted += self
                        .store
                        .insert_samples(race.location_id, std::slice::from_ref(sample))?;
                }
            }
        }

        debug!(
            "Reconciled race {} ({}): {} inserted, {} updated",
            race.id, race.name, outcome.inserted, outcome.updated
        );
        Ok(outcome)
    }
}
