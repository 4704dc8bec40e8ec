//! Bounded polling primitive.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Poll `probe` until it yields `Some`, sleeping `interval` between attempts
/// and giving up once `timeout` has elapsed.
///
/// Every suspension point in the pipeline goes through here, fingerprint
/// confirmation after navigation and export-file appearance alike, so there
/// is no unbounded wait anywhere and no per-call-site sleep tuning.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        if Instant::now() >= deadline {
            return None;
        }
        sleep(interval).await;
    }
}
