//! Per-job outcomes and batch summaries

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use serde::Serialize;

use crate::processing::{ConversionResult, JobFailure, JobStage};

/// Final state of one job
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub stage: JobStage,
    /// Stage the job stopped in when it failed
    pub failed_at: Option<JobStage>,
    pub error: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes_written: u64,
    pub source_deleted: bool,
    pub delete_error: Option<String>,
    pub elapsed_ms: u64,
}

impl JobOutcome {
    pub fn converted(result: ConversionResult) -> Self {
        Self {
            source: result.source,
            output: Some(result.output),
            stage: JobStage::Done,
            failed_at: None,
            error: None,
            width: Some(result.width),
            height: Some(result.height),
            bytes_written: result.bytes_written,
            source_deleted: result.source_deleted,
            delete_error: result.delete_error,
            elapsed_ms: result.processing_time.as_millis() as u64,
        }
    }

    pub fn failed(source: PathBuf, failure: &JobFailure, elapsed: Duration) -> Self {
        Self {
            source,
            output: None,
            stage: JobStage::Failed,
            failed_at: Some(failure.stage),
            error: Some(failure.error.user_message()),
            width: None,
            height: None,
            bytes_written: 0,
            source_deleted: false,
            delete_error: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of a batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub converted: usize,
    pub failed: usize,
    pub deleted: usize,
    pub delete_failures: usize,
    pub bytes_written: u64,
    pub parallelism: usize,
    pub slots_acquired: usize,
    pub slots_released: usize,
    pub elapsed_secs: f64,
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(
        outcomes: Vec<JobOutcome>,
        parallelism: usize,
        slots_acquired: usize,
        slots_released: usize,
        elapsed: Duration,
    ) -> Self {
        let converted = outcomes.iter().filter(|o| o.is_success()).count();
        let deleted = outcomes.iter().filter(|o| o.source_deleted).count();
        let delete_failures = outcomes.iter().filter(|o| o.delete_error.is_some()).count();
        let bytes_written = outcomes.iter().map(|o| o.bytes_written).sum();

        Self {
            total: outcomes.len(),
            converted,
            failed: outcomes.len() - converted,
            deleted,
            delete_failures,
            bytes_written,
            parallelism,
            slots_acquired,
            slots_released,
            elapsed_secs: elapsed.as_secs_f64(),
            outcomes,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Converted files per second of wall time
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.converted as f64 / self.elapsed_secs
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!();
        println!("{}", style("Conversion Summary:").bold());
        println!("  {}: {}", style("Converted").green(), self.converted);
        if self.failed > 0 {
            println!("  {}: {}", style("Failed").red(), self.failed);
        }
        if self.deleted > 0 || self.delete_failures > 0 {
            println!("  {}: {}", style("Originals deleted").cyan(), self.deleted);
        }
        if self.delete_failures > 0 {
            println!("  {}: {}", style("Delete failures").yellow(), self.delete_failures);
        }
        println!("  {}: {:.2}s", style("Duration").blue(), self.elapsed_secs);

        if self.converted > 0 {
            println!(
                "  {}: {:.2}MB written ({:.1} files/sec, {} workers)",
                style("Output").cyan(),
                self.bytes_written as f64 / 1024.0 / 1024.0,
                self.files_per_second(),
                self.parallelism
            );
        }

        let failures: Vec<_> = self.failures().collect();
        if !failures.is_empty() {
            println!("\nErrors:");
            for (i, outcome) in failures.iter().enumerate() {
                println!(
                    "  {}: {}: {}",
                    i + 1,
                    outcome.source.display(),
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
