//! Per-host request pacing
//!
//! Each host gets one pacer. A caller waits until at least the host's interval
//! has passed since the previous permit; waiting callers are served in arrival
//! order and never dropped.

use crate::config::Host;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Pacer {
    interval: Duration,
    last_permit: tokio::sync::Mutex<Option<Instant>>,
}

impl Pacer {
    async fn acquire(&self) {
        // Holding the lock while sleeping keeps waiters queued in order
        let mut last = self.last_permit.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Rate limiter shared by every pagination loop
#[derive(Default)]
pub struct RateLimiter {
    pacers: Mutex<HashMap<String, Arc<Pacer>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `host` may be sent another request
    pub async fn acquire(&self, host: &Host) {
        let interval = host.rate_limit.interval();
        if interval.is_zero() {
            return;
        }

        let pacer = {
            let mut pacers = self.pacers.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(pacers.entry(host.id.clone()).or_insert_with(|| {
                tracing::debug!("Pacing {} at one request every {:?}", host.id, interval);
                Arc::new(Pacer {
                    interval,
                    last_permit: tokio::sync::Mutex::new(None),
                })
            }))
        };

        pacer.acquire().await;
    }
}
