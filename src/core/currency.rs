//! Exchange-rate source abstractions

use crate::core::snapshot::RateSnapshot;
use anyhow::Result;
use async_trait::async_trait;

/// A remote service that can produce a complete set of latest rates.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetches the latest rates. Any failure is reported as an error; the
    /// caller decides how to degrade.
    async fn fetch_latest(&self) -> Result<RateSnapshot>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: RateSource + ?Sized> RateSource for std::sync::Arc<T> {
    async fn fetch_latest(&self) -> Result<RateSnapshot> {
        (**self).fetch_latest().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
