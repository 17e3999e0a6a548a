//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod rate_provider;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for cleaner imports
pub use currency::RateSource;
pub use error::ConversionError;
pub use rate_provider::{
    OnFetchFailure, REFRESH_INTERVAL, RateProvider, RefreshOptions, RefreshOutcome,
    SnapshotStatus,
};
pub use snapshot::RateSnapshot;
