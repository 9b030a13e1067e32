//! Fixed-capacity pool of concurrency slots

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::debug;

use crate::error::{HeicConvError, Result};

/// Admission-control pool bounding how many jobs run at once
///
/// Built per batch; never shared across runs.
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
}

/// One reserved slot; released exactly once when dropped
#[derive(Debug)]
pub struct ConcurrencySlot {
    _permit: OwnedSemaphorePermit,
    released: Arc<AtomicUsize>,
}

impl Drop for ConcurrencySlot {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        debug!("Creating slot pool with {} slots", capacity);

        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserve a slot without waiting; `Ok(None)` means the pool is saturated
    pub fn try_reserve(&self) -> Result<Option<ConcurrencySlot>> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(self.wrap(permit))),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(HeicConvError::system("Slot pool is closed")),
        }
    }

    /// Reserve a slot, waiting for one to be released if necessary
    pub async fn reserve(&self) -> Result<ConcurrencySlot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| HeicConvError::system(format!("Failed to acquire slot: {}", e)))?;
        Ok(self.wrap(permit))
    }

    fn wrap(&self, permit: OwnedSemaphorePermit) -> ConcurrencySlot {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        ConcurrencySlot {
            _permit: permit,
            released: Arc::clone(&self.released),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_try_reserve_until_saturated() {
        let pool = SlotPool::new(2);
        let a = pool.try_reserve().unwrap();
        let b = pool.try_reserve().unwrap();
        assert!(a.is_some() && b.is_some());
        assert!(pool.try_reserve().unwrap().is_none());

        drop(a);
        assert_eq!(pool.released(), 1);
        let c = pool.try_reserve().unwrap();
        assert!(c.is_some());
        assert!(pool.try_reserve().unwrap().is_none());
        assert_eq!(pool.acquired(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let pool = SlotPool::new(0);
        assert_eq!(pool.capacity(), 1);
    }

    #[tokio::test]
    async fn test_reserve_waits_for_release() {
        let pool = Arc::new(SlotPool::new(1));
        let held = pool.reserve().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.reserve().await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(pool.acquired(), 2);
        assert_eq!(pool.released(), 2);
    }
}
