use thiserror::Error;

/// Errors returned to callers of a currency conversion.
///
/// Both variants are expected in normal operation: a dashboard widget that
/// receives one should render as unavailable instead of failing the page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// No usable rate snapshot has been fetched yet, or the last fetch
    /// produced nothing.
    #[error("Exchange rates are unavailable")]
    RatesUnavailable,
    /// The currency code is not present in the current snapshot.
    #[error("Invalid currency code {0}")]
    UnknownCurrency(String),
}
