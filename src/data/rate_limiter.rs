use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Per-minute request weight budget shared by every call to the exchange.
///
/// Waits until the next wall-clock minute when the budget is spent. It never
/// replays a request, it only delays the next one.
#[derive(Clone)]
pub struct RequestWeightLimiter {
    inner: Arc<Mutex<InnerLimiter>>,
}

struct InnerLimiter {
    used_weight: u32,
    // Minutes since epoch for the bucket being counted
    current_minute_idx: u64,
    limit: u32,
}

impl InnerLimiter {
    /// Charges `cost` against the bucket for `now_idx` if it fits.
    fn try_take(&mut self, cost: u32, now_idx: u64) -> bool {
        if now_idx > self.current_minute_idx {
            self.used_weight = 0;
            self.current_minute_idx = now_idx;
        }

        // A single call heavier than the whole budget is let through on a fresh minute.
        if self.used_weight + cost <= self.limit || self.used_weight == 0 {
            self.used_weight += cost;
            return true;
        }
        false
    }
}

impl RequestWeightLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerLimiter {
                used_weight: 0,
                current_minute_idx: Self::get_current_minute_idx(),
                limit,
            })),
        }
    }

    /// Acquires permission to use `cost` weight.
    pub async fn acquire(&self, cost: u32, context: &str) {
        loop {
            let (wait_duration, stats) = {
                let mut guard = self.inner.lock().await;
                if guard.try_take(cost, Self::get_current_minute_idx()) {
                    return;
                }

                (Self::until_next_minute(), (guard.used_weight, guard.limit))
            };

            log::warn!(
                "Request weight saturated for [{}]. Used: {}/{}. Waiting {:.1}s (until :00)...",
                context,
                stats.0,
                stats.1,
                wait_duration.as_secs_f64()
            );

            tokio::time::sleep(wait_duration).await;
        }
    }

    pub async fn used_weight(&self) -> u32 {
        self.inner.lock().await.used_weight
    }

    fn until_next_minute() -> Duration {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        // Small buffer so we land inside the next minute
        Duration::from_secs(60 - now_secs % 60) + Duration::from_millis(100)
    }

    fn get_current_minute_idx() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
            / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_within_budget_does_not_wait() {
        let limiter = RequestWeightLimiter::new(10);
        let acquired = tokio::time::timeout(Duration::from_secs(1), async {
            limiter.acquire(4, "test").await;
            limiter.acquire(4, "test").await;
        })
        .await;
        assert!(acquired.is_ok());
        // A minute rollover between the two calls resets the count.
        let used = limiter.used_weight().await;
        assert!(used == 4 || used == 8);
    }

    #[tokio::test]
    async fn oversized_call_passes_on_an_empty_bucket() {
        let limiter = RequestWeightLimiter::new(1);
        let acquired =
            tokio::time::timeout(Duration::from_secs(1), limiter.acquire(5, "test")).await;
        assert!(acquired.is_ok());
        assert_eq!(limiter.used_weight().await, 5);
    }

    #[test]
    fn saturated_bucket_refuses_until_the_minute_rolls_over() {
        let mut bucket = InnerLimiter {
            used_weight: 0,
            current_minute_idx: 100,
            limit: 6,
        };

        assert!(bucket.try_take(4, 100));
        assert!(!bucket.try_take(4, 100));
        assert_eq!(bucket.used_weight, 4);
        assert!(bucket.try_take(2, 100));
        assert!(!bucket.try_take(1, 100));

        assert!(bucket.try_take(4, 101));
        assert_eq!(bucket.used_weight, 4);
        assert_eq!(bucket.current_minute_idx, 101);
    }

    #[test]
    fn oversized_call_waits_behind_a_partly_used_bucket() {
        let mut bucket = InnerLimiter {
            used_weight: 1,
            current_minute_idx: 7,
            limit: 3,
        };
        assert!(!bucket.try_take(5, 7));
        assert!(bucket.try_take(5, 8));
        assert_eq!(bucket.used_weight, 5);
    }

    #[test]
    fn wait_lands_inside_next_minute() {
        let wait = RequestWeightLimiter::until_next_minute();
        assert!(wait > Duration::from_millis(100));
        assert!(wait <= Duration::from_secs(60) + Duration::from_millis(100));
    }
}
