//! Request pacing for the catalog
//!
//! The catalog is a shared external resource, so every outbound request goes
//! through a `RateLimiter` that enforces a minimum spacing between request
//! starts. The limiter is shared by reference: one fetcher or many, the
//! aggregate request rate never exceeds one request per interval.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-interval request scheduler
///
/// Callers `acquire` a slot before each request. The first slot is granted
/// immediately unless the limiter was created with `after_grant`; each later
/// slot is granted no earlier than `interval` after the previous one. Waiters
/// are served in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter granting at most one slot per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_grant: Mutex::new(None),
        }
    }

    /// Creates a limiter whose first slot waits `interval` after `last_grant`
    ///
    /// Used when a request went out before the interval was known.
    pub fn after_grant(interval: Duration, last_grant: Instant) -> Self {
        Self {
            interval,
            last_grant: Mutex::new(Some(last_grant)),
        }
    }

    /// Minimum spacing between two grants
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next request slot
    ///
    /// # Returns
    ///
    /// How long the caller was held back for spacing (zero for the first
    /// request). Time spent queueing behind other waiters is not included.
    pub async fn acquire(&self) -> Duration {
        // Held across the sleep so concurrent callers queue up behind it
        let mut last_grant = self.last_grant.lock().await;

        let now = Instant::now();
        let mut waited = Duration::ZERO;

        if let Some(previous) = *last_grant {
            let ready_at = previous + self.interval;
            if ready_at > now {
                waited = ready_at - now;
                tracing::trace!("Politeness delay: waiting {:?}", waited);
                tokio::time::sleep_until(ready_at).await;
            }
        }

        *last_grant = Some(Instant::now());
        waited
    }
}

/// Calculates the effective politeness delay
///
/// This takes the maximum of:
/// - The configured politeness delay
/// - The robots.txt crawl delay (if specified), capped at `max_robots_delay`
pub fn effective_delay(
    configured: Duration,
    robots_delay_secs: Option<f64>,
    max_robots_delay: Duration,
) -> Duration {
    let robots_delay = robots_delay_secs
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| match Duration::try_from_secs_f64(secs) {
            Ok(delay) if delay <= max_robots_delay => delay,
            _ => {
                tracing::warn!(
                    "robots.txt Crawl-delay of {}s exceeds the {:?} cap; using the cap",
                    secs,
                    max_robots_delay
                );
                max_robots_delay
            }
        })
        .unwrap_or(Duration::ZERO);

    std::cmp::max(configured, robots_delay)
}
