use axum::http::HeaderMap;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_MAX_REQUESTS: u32 = 20;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const UNKNOWN_CLIENT: &str = "unknown";
const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at_ms: i64,
}

#[derive(Debug, Default)]
struct LimiterState {
    entries: HashMap<String, RateLimitEntry>,
    last_prune_ms: Option<i64>,
}

impl LimiterState {
    // Full scan at most once per window; in between, a full table refuses new keys.
    fn make_room(&mut self, now_ms: i64, window_ms: i64) -> bool {
        if self.entries.len() < MAX_RATE_LIMIT_ENTRIES {
            return true;
        }
        let due = self
            .last_prune_ms
            .map_or(true, |last| now_ms >= last.saturating_add(window_ms));
        if due {
            self.entries.retain(|_, e| now_ms <= e.reset_at_ms);
            self.last_prune_ms = Some(now_ms);
        }
        self.entries.len() < MAX_RATE_LIMIT_ENTRIES
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window_ms: i64,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max.max(1),
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub async fn allow(&self, client_id: &str) -> bool {
        self.allow_at(client_id, Utc::now().timestamp_millis()).await
    }

    pub async fn allow_at(&self, client_id: &str, now_ms: i64) -> bool {
        let mut state = self.state.lock().await;

        if let Some(entry) = state.entries.get_mut(client_id) {
            if now_ms <= entry.reset_at_ms {
                if entry.count >= self.max {
                    return false;
                }
                entry.count += 1;
                return true;
            }
            *entry = RateLimitEntry {
                count: 1,
                reset_at_ms: now_ms.saturating_add(self.window_ms),
            };
            return true;
        }

        if !state.make_room(now_ms, self.window_ms) {
            return false;
        }
        state.entries.insert(
            client_id.to_string(),
            RateLimitEntry {
                count: 1,
                reset_at_ms: now_ms.saturating_add(self.window_ms),
            },
        );
        true
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}

// Direct clients share the `unknown` bucket.
pub fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn allows_up_to_max_then_denies_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_millis(1000));
        assert!(limiter.allow_at("a", 0).await);
        assert!(limiter.allow_at("a", 100).await);
        assert!(limiter.allow_at("a", 200).await);
        assert!(!limiter.allow_at("a", 300).await);
        assert!(!limiter.allow_at("a", 1000).await);
    }

    #[tokio::test]
    async fn resets_after_window_expires() {
        let limiter = RateLimiter::new(3, Duration::from_millis(1000));
        for t in [0, 1, 2] {
            assert!(limiter.allow_at("a", t).await);
        }
        assert!(!limiter.allow_at("a", 500).await);
        assert!(limiter.allow_at("a", 1001).await);
        // fresh window counted from 1001, so two more fit
        assert!(limiter.allow_at("a", 1002).await);
        assert!(limiter.allow_at("a", 1003).await);
        assert!(!limiter.allow_at("a", 1004).await);
    }

    #[tokio::test]
    async fn clients_are_isolated() {
        let limiter = RateLimiter::new(2, Duration::from_millis(1000));
        assert!(limiter.allow_at("a", 0).await);
        assert!(limiter.allow_at("a", 0).await);
        assert!(!limiter.allow_at("a", 0).await);
        assert!(limiter.allow_at("b", 0).await);
        assert!(limiter.allow_at("b", 0).await);
        assert!(!limiter.allow_at("b", 0).await);
    }

    #[tokio::test]
    async fn permits_burst_across_window_edge() {
        let limiter = RateLimiter::new(2, Duration::from_millis(1000));
        assert!(limiter.allow_at("a", 0).await);
        assert!(limiter.allow_at("a", 999).await);
        assert!(limiter.allow_at("a", 1001).await);
        assert!(limiter.allow_at("a", 1002).await);
    }

    #[tokio::test]
    async fn prunes_expired_entries_when_full() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        for i in 0..MAX_RATE_LIMIT_ENTRIES {
            assert!(limiter.allow_at(&format!("client-{i}"), 0).await);
        }
        assert_eq!(limiter.tracked_clients().await, MAX_RATE_LIMIT_ENTRIES);
        assert!(limiter.allow_at("late", 100).await);
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[tokio::test]
    async fn table_stays_capped_under_a_flood_of_live_clients() {
        let limiter = RateLimiter::new(5, Duration::from_millis(60_000));
        let mut admitted = 0;
        for i in 0..12_000 {
            if limiter.allow_at(&format!("client-{i}"), i).await {
                admitted += 1;
            }
        }
        assert_eq!(admitted, MAX_RATE_LIMIT_ENTRIES);
        assert_eq!(limiter.tracked_clients().await, MAX_RATE_LIMIT_ENTRIES);

        // clients already tracked keep their own window
        assert!(limiter.allow_at("client-0", 12_000).await);
        assert!(!limiter.allow_at("newcomer", 12_000).await);

        // once the first entries expire, the next sweep frees their slots
        assert!(limiter.allow_at("newcomer", 70_000).await);
        assert!(limiter.tracked_clients().await <= MAX_RATE_LIMIT_ENTRIES);
    }

    #[tokio::test]
    async fn sweeps_at_most_once_per_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(1000));
        for i in 0..MAX_RATE_LIMIT_ENTRIES {
            assert!(limiter.allow_at(&format!("client-{i}"), 0).await);
        }
        assert!(!limiter.allow_at("first", 500).await);
        // entries expire after 1000, but the last sweep ran at 500
        assert!(!limiter.allow_at("second", 1200).await);
        assert!(limiter.allow_at("third", 1500).await);
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn client_id_uses_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_id(&headers), "203.0.113.7");
    }

    #[test]
    fn client_id_falls_back_to_sentinel() {
        assert_eq!(client_id(&HeaderMap::new()), UNKNOWN_CLIENT);
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(client_id(&headers), UNKNOWN_CLIENT);
    }
}
