use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async request with configurable attempts and delays
///
/// Only transport failures are retried; a response with any status is
/// returned to the caller as-is. Error URLs are stripped before logging
/// since request URLs may carry credentials.
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(reqwest::Error::without_url) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err.into());
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn unreachable_request(client: &reqwest::Client) -> Result<String, reqwest::Error> {
        // Port 1 is reserved; connecting fails immediately on loopback.
        client.get("http://127.0.0.1:1/secret-key").send().await?.text().await
    }

    #[tokio::test]
    async fn test_retries_then_gives_up() {
        let client = reqwest::Client::new();
        let attempts = AtomicUsize::new(0);

        let result = with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                unreachable_request(&client)
            },
            2,
            1,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(!result.unwrap_err().to_string().contains("secret-key"));
    }
}
