//! Rate-limited wrapper around a forecast provider.
//!
//! Enforces the self-imposed call ceiling for one synchronization pass. When
//! the budget is exhausted the cooldown suspends only the calling task; the
//! rest of the process keeps serving.

use std::time::Duration;

use common::{Location, Result};
use tokio::time::Instant;
use tracing::warn;

use crate::budget::{Admission, FetchBudget};
use crate::{ForecastProvider, ForecastResponse};

/// A forecast provider behind a pass-scoped call budget.
///
/// Construct one per pass so the budget never leaks across passes.
pub struct RateLimitedFetcher<'a, P> {
    provider: &'a P,
    budget: FetchBudget,
}

impl<'a, P: ForecastProvider> RateLimitedFetcher<'a, P> {
    pub fn new(provider: &'a P, ceiling: u32, window: Duration) -> Self {
        Self {
            provider,
            budget: FetchBudget::new(ceiling, window),
        }
    }

    /// Fetch the forecast for a location, sleeping through a cooldown first
    /// if the call budget is spent.
    pub async fn fetch(&mut self, location: &Location) -> Result<ForecastResponse> {
        loop {
            match self.budget.admit(Instant::now()) {
                Admission::Granted => break,
                Admission::CoolDown(wait) => {
                    warn!(
                        "Provider call budget spent ({} calls); cooling down {}s",
                        self.budget.calls_in_window(),
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
        self.provider.fetch_forecast(location).await
    }
}
