use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use sea_orm::DatabaseConnection;

use crate::models::Notice;
use crate::repo::KeypairRepo;
use crate::scanner::{Scanner, TagReader};

/// Simple fixed-window rate limiter keyed by an arbitrary string
pub struct RateLimiter {
    /// Maps key → (request count, window start)
    limits: DashMap<String, (u32, Instant)>,
    max_requests: u32,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            limits: DashMap::new(),
            max_requests,
            window_secs,
        }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.limits.entry(key.to_string()).or_insert((0, now));
        let (count, window_start) = entry.value_mut();
        if now.duration_since(*window_start).as_secs() >= self.window_secs {
            // Reset window
            *count = 1;
            *window_start = now;
            true
        } else if *count < self.max_requests {
            *count += 1;
            true
        } else {
            false
        }
    }
}

/// Per-operator queue of notices waiting for the next list view
#[derive(Default)]
pub struct FlashStore {
    pending: DashMap<String, Vec<Notice>>,
}

impl FlashStore {
    pub fn push(&self, operator_id: &str, notice: Notice) {
        self.pending
            .entry(operator_id.to_string())
            .or_default()
            .push(notice);
    }

    /// Remove and return everything queued for this operator.
    pub fn take(&self, operator_id: &str) -> Vec<Notice> {
        self.pending
            .remove(operator_id)
            .map(|(_, notices)| notices)
            .unwrap_or_default()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub keypairs: KeypairRepo,
    /// Single-flight access to the RFID reader
    pub scanner: Arc<Scanner>,
    pub flash: Arc<FlashStore>,
    /// JWT signing secret
    pub jwt_secret: String,
    /// Rate limiter for login attempts, keyed by username
    pub auth_rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, jwt_secret: String, reader: Arc<dyn TagReader>) -> Self {
        Self {
            keypairs: KeypairRepo::new(db.clone()),
            db,
            scanner: Arc::new(Scanner::new(reader)),
            flash: Arc::new(FlashStore::default()),
            jwt_secret,
            auth_rate_limiter: Arc::new(RateLimiter::new(10, 60)), // 10 attempts/min per username
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_blocks_after_limit() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.check("admin"));
        assert!(limiter.check("admin"));
        assert!(!limiter.check("admin"));
        assert!(limiter.check("other"));
    }

    #[test]
    fn test_flash_notices_are_taken_once() {
        let flash = FlashStore::default();
        flash.push("op-1", Notice::error("first"));
        flash.push("op-1", Notice::success("second"));
        flash.push("op-2", Notice::success("elsewhere"));

        let taken = flash.take("op-1");
        assert_eq!(taken, vec![Notice::error("first"), Notice::success("second")]);
        assert!(flash.take("op-1").is_empty());
        assert_eq!(flash.take("op-2").len(), 1);
    }
}
