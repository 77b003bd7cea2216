//! Per-key single-flight deduplication.
//!
//! Concurrent requests for the same cache key serialize through a
//! per-key permit so at most one upstream computation per key is in
//! flight at a time. Holders re-check the cache after acquiring the
//! permit; followers then hit the freshly stored value instead of
//! paying the upstream cost again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type SlotMap = Arc<StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Issues per-key permits for in-flight computations.
#[derive(Clone, Default)]
pub struct SingleFlight {
    inflight: SlotMap,
}

impl SingleFlight {
    /// Create an empty flight group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the permit for `key`, waiting while another holder has
    /// it. The permit is released when the returned guard drops,
    /// whether the computation succeeded or failed.
    pub async fn acquire(&self, key: &str) -> FlightPermit {
        let slot = {
            let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = slot.clone().lock_owned().await;

        FlightPermit {
            key: key.to_string(),
            slot,
            inflight: self.inflight.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

/// RAII permit for one key's in-flight computation.
pub struct FlightPermit {
    key: String,
    slot: Arc<AsyncMutex<()>>,
    inflight: SlotMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        // Release the lock before pruning so waiters can proceed.
        self.guard.take();

        let mut map = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        // Holders of the slot: the map entry, this permit, and any
        // waiter currently parked on `lock_owned`. Prune only our own
        // slot, and only when nobody is waiting on it.
        if let Some(entry) = map.get(&self.key) {
            if Arc::ptr_eq(entry, &self.slot) && Arc::strong_count(&self.slot) <= 2 {
                map.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn same_key_serializes() {
        let flights = SingleFlight::new();
        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = flights.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = flights.acquire("shared").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(flights.len(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently() {
        let flights = SingleFlight::new();

        let first = flights.acquire("a").await;
        // A different key must not block on the first permit.
        let second = tokio::time::timeout(Duration::from_millis(50), flights.acquire("b")).await;
        assert!(second.is_ok());

        drop(first);
        assert_eq!(flights.len(), 1);
    }

    #[tokio::test]
    async fn permit_is_released_on_drop() {
        let flights = SingleFlight::new();

        let permit = flights.acquire("k").await;
        drop(permit);
        assert_eq!(flights.len(), 0);

        // Re-acquire immediately; must not deadlock.
        let again =
            tokio::time::timeout(Duration::from_millis(50), flights.acquire("k")).await;
        assert!(again.is_ok());
    }
}
