//! Bounded-concurrency batch coordination
//!
//! Every job gets its own tokio task, but a task is only spawned once a slot
//! has been reserved for it. Reservation happens on the launching task, so
//! launching itself blocks once the pool is saturated; at most `parallelism`
//! workers exist at any time. All workers wait on a shared [`StartBarrier`]
//! before touching their source.
//!
//! The barrier fires once, after the last job has been launched. If the
//! launcher has to wait for a slot before that point, it fires the barrier
//! first so the workers already holding slots can run and release them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, error, info};

use crate::error::HeicConvError;
use crate::processing::{ConversionEngine, ConversionJob, HeifDecoder, JobFailure, JobStage};

pub mod barrier;
pub mod progress;
pub mod report;
pub mod slots;

pub use barrier::*;
pub use progress::*;
pub use report::*;
pub use slots::*;

/// Fans a list of jobs out over a bounded pool of workers
pub struct BatchCoordinator {
    engine: Arc<ConversionEngine>,
    parallelism: usize,
    progress_tracker: Arc<ProgressTracker>,
}

impl BatchCoordinator {
    /// Create a coordinator; `None` uses the host's logical CPU count
    pub fn new(decoder: Arc<dyn HeifDecoder>, parallelism: Option<usize>) -> Self {
        Self::with_engine(Arc::new(ConversionEngine::new(decoder)), parallelism)
    }

    pub fn with_engine(engine: Arc<ConversionEngine>, parallelism: Option<usize>) -> Self {
        let parallelism = parallelism.unwrap_or_else(num_cpus::get).max(1);

        info!("Number of CPUs: {}", parallelism);
        debug!("Using decoder: {}", engine.decoder_name());

        Self {
            engine,
            parallelism,
            progress_tracker: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress_tracker)
    }

    /// Convert every job and wait for all of them
    ///
    /// A failing job never stops the others; its error ends up in the report.
    pub async fn run(&self, jobs: Vec<ConversionJob>) -> BatchReport {
        let start_time = Instant::now();
        let total_jobs = jobs.len();

        self.progress_tracker.start(total_jobs);

        if jobs.is_empty() {
            info!("No files to convert");
            self.progress_tracker.complete_batch();
            return BatchReport::from_outcomes(Vec::new(), self.parallelism, 0, 0, start_time.elapsed());
        }

        info!(
            "Starting conversion of {} files with {} slots",
            total_jobs, self.parallelism
        );

        for job in &jobs {
            self.progress_tracker.stage(&job.source, JobStage::Queued);
        }

        let pool = SlotPool::new(self.parallelism);
        let (barrier, gate) = StartBarrier::new();
        let mut barrier = Some(barrier);

        let mut workers = Vec::with_capacity(total_jobs);
        let mut outcomes = Vec::with_capacity(total_jobs);

        for job in jobs {
            let slot = match reserve_slot(&pool, &mut barrier).await {
                Ok(slot) => slot,
                Err(e) => {
                    error!("Could not reserve a slot for {}: {}", job.source.display(), e);
                    let failure = JobFailure::at(JobStage::Queued, e);
                    outcomes.push(self.record_failure(job.source, &failure, start_time));
                    continue;
                }
            };
            self.progress_tracker.stage(&job.source, JobStage::SlotReserved);

            let source = job.source.clone();
            let worker = Worker {
                engine: Arc::clone(&self.engine),
                progress_tracker: Arc::clone(&self.progress_tracker),
                gate: gate.clone(),
                slot,
            };
            workers.push((source, tokio::spawn(worker.run(job))));
        }

        if let Some(barrier) = barrier.take() {
            debug!("All {} workers launched, releasing start barrier", workers.len());
            barrier.fire();
        }

        let (sources, handles): (Vec<PathBuf>, Vec<_>) = workers.into_iter().unzip();
        let results = join_all(handles).await;

        for (source, result) in sources.into_iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    let failure = JobFailure::at(
                        JobStage::Failed,
                        HeicConvError::system(format!("Task join error: {}", e)),
                    );
                    error!("Worker for {} did not finish: {}", source.display(), e);
                    outcomes.push(self.record_failure(source, &failure, start_time));
                }
            }
        }

        self.progress_tracker.complete_batch();

        let processing_time = start_time.elapsed();
        info!("Conversion finished in {:.2}s", processing_time.as_secs_f64());

        BatchReport::from_outcomes(
            outcomes,
            pool.capacity(),
            pool.acquired(),
            pool.released(),
            processing_time,
        )
    }

    fn record_failure(&self, source: PathBuf, failure: &JobFailure, start_time: Instant) -> JobOutcome {
        self.progress_tracker
            .job_finished(&source, None, false, Some(failure.error.user_message()));
        JobOutcome::failed(source, failure, start_time.elapsed())
    }
}

/// Reserve a slot, firing the barrier first if the pool is saturated
///
/// This may block the caller until a running worker finishes.
async fn reserve_slot(
    pool: &SlotPool,
    barrier: &mut Option<StartBarrier>,
) -> crate::error::Result<ConcurrencySlot> {
    if let Some(slot) = pool.try_reserve()? {
        return Ok(slot);
    }

    if let Some(barrier) = barrier.take() {
        debug!("Slot pool saturated, releasing start barrier early");
        barrier.fire();
    }

    pool.reserve().await
}

/// Everything one spawned worker owns
struct Worker {
    engine: Arc<ConversionEngine>,
    progress_tracker: Arc<ProgressTracker>,
    gate: StartGate,
    slot: ConcurrencySlot,
}

impl Worker {
    async fn run(mut self, job: ConversionJob) -> JobOutcome {
        let start_time = Instant::now();
        let tracker = Arc::clone(&self.progress_tracker);

        tracker.stage(&job.source, JobStage::AwaitingStart);
        if !self.gate.wait().await {
            let failure = JobFailure::at(
                JobStage::AwaitingStart,
                HeicConvError::system("Start barrier dropped before firing"),
            );
            tracker.job_started();
            tracker.job_finished(&job.source, None, false, Some(failure.error.user_message()));
            return JobOutcome::failed(job.source, &failure, start_time.elapsed());
        }

        tracker.job_started();
        let result = self
            .engine
            .convert_observed(&job, |stage| tracker.stage(&job.source, stage))
            .await;

        let outcome = match result {
            Ok(result) => JobOutcome::converted(result),
            Err(failure) => {
                error!("{}: {}", job.source.display(), failure.error.user_message());
                JobOutcome::failed(job.source.clone(), &failure, start_time.elapsed())
            }
        };

        tracker.job_finished(
            &outcome.source,
            outcome.output.as_deref(),
            outcome.source_deleted,
            outcome.error.clone(),
        );

        // Release before the join handle resolves
        drop(self.slot);
        outcome
    }
}
