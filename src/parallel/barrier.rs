//! One-shot start barrier shared by the workers of a batch

use tokio::sync::watch;

/// Firing side of the barrier; consumed by [`StartBarrier::fire`]
#[derive(Debug)]
pub struct StartBarrier {
    sender: watch::Sender<bool>,
}

/// Waiting side of the barrier, cloned into every worker
#[derive(Debug, Clone)]
pub struct StartGate {
    receiver: watch::Receiver<bool>,
}

impl StartBarrier {
    pub fn new() -> (Self, StartGate) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, StartGate { receiver })
    }

    /// Release every current and future waiter
    pub fn fire(self) {
        self.sender.send_replace(true);
    }
}

impl StartGate {
    /// Block until the barrier fires
    ///
    /// Returns `false` if the barrier was dropped without firing.
    pub async fn wait(&mut self) -> bool {
        self.receiver.wait_for(|fired| *fired).await.is_ok()
    }

    pub fn is_open(&self) -> bool {
        *self.receiver.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_waiters_block_until_fired() {
        let (barrier, gate) = StartBarrier::new();
        let passed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mut gate = gate.clone();
            let passed = Arc::clone(&passed);
            handles.push(tokio::spawn(async move {
                assert!(gate.wait().await);
                passed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(passed.load(Ordering::SeqCst), 0);
        assert!(!gate.is_open());

        barrier.fire();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(passed.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_late_waiters_pass_immediately() {
        let (barrier, gate) = StartBarrier::new();
        barrier.fire();

        let mut late = gate.clone();
        let opened = tokio::time::timeout(Duration::from_secs(1), late.wait())
            .await
            .unwrap();
        assert!(opened);
        assert!(gate.is_open());
    }

    #[tokio::test]
    async fn test_fire_without_waiters_still_opens() {
        let (barrier, gate) = StartBarrier::new();
        let receiver_only = gate.clone();
        drop(gate);

        barrier.fire();
        assert!(receiver_only.is_open());
    }

    #[tokio::test]
    async fn test_dropped_barrier_reports_closed() {
        let (barrier, mut gate) = StartBarrier::new();
        drop(barrier);
        assert!(!gate.wait().await);
    }
}
