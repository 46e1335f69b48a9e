use anyhow::Result;
use reqwest::Response;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Sends a request, retrying when it fails at the transport level or the
/// server answers with a 5xx status.
///
/// Runs the request at most `1 + retries` times, pausing `delay` in between.
/// Once retries are exhausted the last 5xx response is returned as is, so the
/// caller reports the status it saw. Client errors (4xx) are never retried.
pub async fn send_with_retry<F, Fut>(mut send: F, retries: usize, delay: Duration) -> Result<Response>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<Response>>,
{
    let mut attempt = 1;
    loop {
        let exhausted = attempt > retries;
        let failure = match send().await {
            Ok(response) if exhausted || !response.status().is_server_error() => {
                return Ok(response);
            }
            Ok(response) => format!("server answered {}", response.status()),
            Err(err) if exhausted => return Err(err.into()),
            Err(err) => err.to_string(),
        };
        warn!(attempt, retries, %failure, "Rate request failed, retrying");
        attempt += 1;
        tokio::time::sleep(delay).await;
    }
}
