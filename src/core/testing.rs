//! In-memory rate sources for unit tests.

use crate::core::currency::RateSource;
use crate::core::snapshot::RateSnapshot;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Builds a snapshot fetched now, based on the first listed currency.
pub fn snapshot_of(rates: &[(&str, f64)]) -> RateSnapshot {
    let base = rates.first().map(|(code, _)| code.to_string());
    let rates: HashMap<String, f64> = rates
        .iter()
        .map(|(code, rate)| (code.to_string(), *rate))
        .collect();
    RateSnapshot::new(base, rates, Utc::now(), None)
}

/// Replays a fixed list of responses, then fails every call after that.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<RateSnapshot, String>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<RateSnapshot, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for ScriptedSource {
    async fn fetch_latest(&self) -> Result<RateSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Err(anyhow!("No scripted response left")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Hands out two snapshots in turn, starting with the first.
pub struct AlternatingSource {
    snapshots: [RateSnapshot; 2],
    calls: AtomicUsize,
}

impl AlternatingSource {
    pub fn new(first: RateSnapshot, second: RateSnapshot) -> Self {
        Self {
            snapshots: [first, second],
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RateSource for AlternatingSource {
    async fn fetch_latest(&self) -> Result<RateSnapshot> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshots[call % 2].clone())
    }

    fn name(&self) -> &str {
        "alternating"
    }
}

/// Answers every call with the same snapshot after a fixed delay, tracking
/// how many calls were in flight at once.
pub struct SlowSource {
    snapshot: RateSnapshot,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowSource {
    pub fn new(snapshot: RateSnapshot, delay: Duration) -> Self {
        Self {
            snapshot,
            delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for SlowSource {
    async fn fetch_latest(&self) -> Result<RateSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }

    fn name(&self) -> &str {
        "slow"
    }
}
