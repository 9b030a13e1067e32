//! Progress tracking for batch conversions

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::processing::JobStage;

/// Thread-safe progress tracker shared by the workers of a batch
pub struct ProgressTracker {
    sender: broadcast::Sender<ProgressUpdate>,
    start_time: Mutex<Option<Instant>>,

    total: AtomicUsize,
    converted: AtomicUsize,
    failed: AtomicUsize,
    deleted: AtomicUsize,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

/// Point-in-time view of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    pub total_jobs: usize,
    pub converted: usize,
    pub failed: usize,
    pub deleted: usize,
    pub active: usize,
    pub peak_active: usize,
    pub elapsed_time: Duration,
}

/// Progress update event
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Started {
        total_jobs: usize,
    },
    StageChanged {
        source: PathBuf,
        stage: JobStage,
    },
    JobFinished {
        source: PathBuf,
        success: bool,
        output: Option<PathBuf>,
        error: Option<String>,
    },
    BatchCompleted {
        final_state: ProgressState,
    },
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);

        Self {
            sender,
            start_time: Mutex::new(None),
            total: AtomicUsize::new(0),
            converted: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
        }
    }

    /// Start tracking a batch of `total_jobs`
    pub fn start(&self, total_jobs: usize) {
        if let Ok(mut start_time) = self.start_time.lock() {
            *start_time = Some(Instant::now());
        }

        self.total.store(total_jobs, Ordering::SeqCst);
        self.converted.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.deleted.store(0, Ordering::SeqCst);
        self.active.store(0, Ordering::SeqCst);
        self.peak_active.store(0, Ordering::SeqCst);

        let _ = self.sender.send(ProgressUpdate::Started { total_jobs });
        debug!("Started progress tracking for {} jobs", total_jobs);
    }

    pub fn stage(&self, source: &Path, stage: JobStage) {
        let _ = self.sender.send(ProgressUpdate::StageChanged {
            source: source.to_path_buf(),
            stage,
        });
    }

    /// A worker passed the start barrier and is about to decode
    pub fn job_started(&self) {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);
    }

    /// A worker finished, successfully or not
    pub fn job_finished(
        &self,
        source: &Path,
        output: Option<&Path>,
        deleted: bool,
        error: Option<String>,
    ) {
        // Jobs that never got a slot were never counted as active
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));

        let success = error.is_none();
        if success {
            self.converted.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        if deleted {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }

        let _ = self.sender.send(ProgressUpdate::JobFinished {
            source: source.to_path_buf(),
            success,
            output: output.map(Path::to_path_buf),
            error,
        });
    }

    pub fn get_state(&self) -> ProgressState {
        let elapsed_time = self
            .start_time
            .lock()
            .ok()
            .and_then(|start| start.map(|s| s.elapsed()))
            .unwrap_or_default();

        ProgressState {
            total_jobs: self.total.load(Ordering::SeqCst),
            converted: self.converted.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            deleted: self.deleted.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
            elapsed_time,
        }
    }

    /// Subscribe to progress updates
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    /// Mark batch as completed
    pub fn complete_batch(&self) {
        let final_state = self.get_state();

        info!(
            "Batch completed: {}/{} converted, {} failed in {:.2}s",
            final_state.converted,
            final_state.total_jobs,
            final_state.failed,
            final_state.elapsed_time.as_secs_f64()
        );

        let _ = self.sender.send(ProgressUpdate::BatchCompleted { final_state });
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    pub fn finished(&self) -> usize {
        self.converted + self.failed
    }

    pub fn completion_percentage(&self) -> f64 {
        if self.total_jobs == 0 {
            return 100.0;
        }
        (self.finished() as f64 / self.total_jobs as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let tracker = ProgressTracker::new();
        tracker.start(3);

        tracker.job_started();
        tracker.job_started();
        tracker.job_finished(Path::new("a.heic"), Some(Path::new("a_heic.jpg")), true, None);
        tracker.job_started();
        tracker.job_finished(Path::new("b.heic"), None, false, Some("boom".to_string()));
        tracker.job_finished(Path::new("c.heic"), Some(Path::new("c_heic.jpg")), false, None);

        let state = tracker.get_state();
        assert_eq!(state.total_jobs, 3);
        assert_eq!(state.converted, 2);
        assert_eq!(state.failed, 1);
        assert_eq!(state.deleted, 1);
        assert_eq!(state.active, 0);
        assert_eq!(state.peak_active, 2);
        assert_eq!(state.completion_percentage(), 100.0);
    }

    #[tokio::test]
    async fn test_updates_are_broadcast() {
        let tracker = ProgressTracker::new();
        let mut updates = tracker.subscribe();

        tracker.start(1);
        tracker.stage(Path::new("a.heic"), JobStage::Decoding);
        tracker.job_started();
        tracker.job_finished(Path::new("a.heic"), None, false, Some("bad".to_string()));
        tracker.complete_batch();

        assert!(matches!(updates.recv().await.unwrap(), ProgressUpdate::Started { total_jobs: 1 }));
        assert!(matches!(
            updates.recv().await.unwrap(),
            ProgressUpdate::StageChanged { stage: JobStage::Decoding, .. }
        ));
        match updates.recv().await.unwrap() {
            ProgressUpdate::JobFinished { success, error, .. } => {
                assert!(!success);
                assert_eq!(error.as_deref(), Some("bad"));
            }
            other => panic!("unexpected update: {:?}", other),
        }
        match updates.recv().await.unwrap() {
            ProgressUpdate::BatchCompleted { final_state } => assert_eq!(final_state.failed, 1),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[test]
    fn test_finish_without_start_keeps_active_at_zero() {
        let tracker = ProgressTracker::new();
        tracker.start(1);
        tracker.job_finished(Path::new("a.heic"), None, false, Some("no slot".to_string()));

        let state = tracker.get_state();
        assert_eq!(state.active, 0);
        assert_eq!(state.failed, 1);
    }

    #[test]
    fn test_empty_batch_is_complete() {
        let tracker = ProgressTracker::new();
        tracker.start(0);
        assert_eq!(tracker.get_state().completion_percentage(), 100.0);
    }
}
