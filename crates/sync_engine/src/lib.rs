//! Forecast synchronization engine.
//!
//! One pass: list active races, dedup by location, fetch under the provider
//! call budget, filter to each race's window, reconcile into storage.
//! Fail-fast throughout; the next scheduled pass is the retry policy.

pub mod dedup;
pub mod filter;
pub mod reaper;
pub mod reconcile;
pub mod scheduler;

pub use dedup::LocationDedup;
pub use filter::filter_window;
pub use reaper::ExpiryReaper;
pub use reconcile::{ForecastReconciler, ReconcileOutcome};
pub use scheduler::{PassOutcome, PassSummary, SyncScheduler};
