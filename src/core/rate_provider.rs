//! The long-lived conversion service: one cached snapshot, refreshed in the
//! background, read synchronously by any number of callers.

use crate::core::currency::RateSource;
use crate::core::error::ConversionError;
use crate::core::snapshot::RateSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Time between background refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// What a refresh does with the current snapshot when the fetch produced
/// no rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFetchFailure {
    /// Keep serving the previous snapshot until a fetch succeeds.
    #[default]
    RetainLastGood,
    /// Swap in the empty snapshot; conversions fail until the next success.
    ReplaceWithEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot with rates is now current.
    Replaced,
    /// The fetch failed and the previous snapshot was kept.
    Retained,
    /// The fetch failed and the empty snapshot is now current.
    Cleared,
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshOptions {
    pub interval: Duration,
    pub on_failure: OnFetchFailure,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            interval: REFRESH_INTERVAL,
            on_failure: OnFetchFailure::default(),
        }
    }
}

/// Summary of the current snapshot, for display and health checks.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotStatus {
    pub source: String,
    pub base: Option<String>,
    pub currencies: usize,
    pub fetched_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub stale: bool,
}

struct Shared {
    source: Box<dyn RateSource>,
    snapshot: RwLock<Arc<RateSnapshot>>,
    on_failure: OnFetchFailure,
    /// Held for a whole fetch-and-install so refreshes never interleave.
    refreshing: tokio::sync::Mutex<()>,
}

impl Shared {
    fn current(&self) -> Arc<RateSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn replace(&self, next: RateSnapshot) {
        let next = Arc::new(next);
        let mut guard = self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    async fn fetch_snapshot(&self) -> RateSnapshot {
        match self.source.fetch_latest().await {
            Ok(snapshot) => {
                debug!(
                    source = self.source.name(),
                    currencies = snapshot.len(),
                    "Fetched exchange rates"
                );
                snapshot
            }
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    error = %e,
                    "Failed to fetch exchange rates"
                );
                RateSnapshot::empty(Utc::now())
            }
        }
    }

    async fn refresh(&self) -> RefreshOutcome {
        let _guard = self.refreshing.lock().await;
        let fetched = self.fetch_snapshot().await;
        if !fetched.is_empty() {
            self.replace(fetched);
            return RefreshOutcome::Replaced;
        }

        match self.on_failure {
            OnFetchFailure::RetainLastGood => RefreshOutcome::Retained,
            OnFetchFailure::ReplaceWithEmpty => {
                self.replace(fetched);
                RefreshOutcome::Cleared
            }
        }
    }
}

/// Converts amounts between currencies using a cached rate snapshot.
///
/// Construct one with [`RateProvider::start`] and share it behind an `Arc`.
/// The background refresh task stops on [`RateProvider::shutdown`] or when
/// the provider is dropped.
pub struct RateProvider {
    shared: Arc<Shared>,
    interval: Duration,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RateProvider {
    /// Creates a provider with an empty snapshot and no refresh task.
    pub fn new<S: RateSource + 'static>(source: S, options: RefreshOptions) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                source: Box::new(source),
                snapshot: RwLock::new(Arc::new(RateSnapshot::empty(Utc::now()))),
                on_failure: options.on_failure,
                refreshing: tokio::sync::Mutex::new(()),
            }),
            interval: options.interval,
            stop,
            task: Mutex::new(None),
        }
    }

    /// Fetches the initial snapshot, then starts refreshing in the background.
    ///
    /// A failed initial fetch still returns a provider; conversions report
    /// [`ConversionError::RatesUnavailable`] until a refresh succeeds.
    pub async fn start<S: RateSource + 'static>(source: S, options: RefreshOptions) -> Self {
        let provider = Self::new(source, options);
        let outcome = provider.refresh().await;
        info!(
            source = provider.shared.source.name(),
            ?outcome,
            "Initial exchange rate fetch complete"
        );
        provider.spawn_refresh_task();
        provider
    }

    fn spawn_refresh_task(&self) {
        let shared = Arc::clone(&self.shared);
        let mut stop = self.stop.subscribe();
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // An in-flight fetch is abandoned on stop
                        tokio::select! {
                            outcome = shared.refresh() => {
                                debug!(?outcome, "Scheduled exchange rate refresh");
                            }
                            _ = stop.changed() => break,
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Exchange rate refresh task stopped");
        });

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Converts `amount` from `from` to `to`, rounded to 2 decimal places.
    ///
    /// Never touches the network. Reads the current snapshot exactly once.
    pub fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, ConversionError> {
        if from == to {
            return Ok(amount);
        }
        self.shared.current().convert(from, to, amount)
    }

    /// Fetches a fresh snapshot without installing it. Failures yield an
    /// empty snapshot and a warning.
    pub async fn fetch_snapshot(&self) -> RateSnapshot {
        self.shared.fetch_snapshot().await
    }

    /// Runs one refresh immediately, the same way the background task does.
    ///
    /// Waits for any refresh already in progress, so a slower fetch can never
    /// install its rates over a newer one.
    #[instrument(skip(self), fields(source = self.shared.source.name()))]
    pub async fn refresh(&self) -> RefreshOutcome {
        self.shared.refresh().await
    }

    pub fn status(&self) -> SnapshotStatus {
        let snapshot = self.shared.current();
        SnapshotStatus {
            source: self.shared.source.name().to_string(),
            base: snapshot.base().map(str::to_string),
            currencies: snapshot.len(),
            fetched_at: snapshot.fetched_at(),
            published_at: snapshot.published_at(),
            stale: snapshot.is_stale(Utc::now(), self.interval),
        }
    }

    pub fn has_rates(&self) -> bool {
        !self.shared.current().is_empty()
    }

    pub fn is_refreshing(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the background refresh task and waits for it to exit.
    pub async fn shutdown(&self) {
        self.stop.send_replace(true);
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Exchange rate refresh task ended abnormally");
        }
    }
}
