//! heicconv - Parallel HEIC to JPEG/PNG batch converter
//!
//! Converts a single HEIC file or every HEIC file under a directory tree into
//! JPEG or PNG. Each file is an independent job; jobs run concurrently on a
//! bounded pool of workers that all wait on a shared start barrier.
//!
//! # Features
//!
//! - **Bounded Concurrency**: at most one worker per slot, default one slot per CPU
//! - **Failure Isolation**: a bad file fails its own job and nothing else
//! - **Safe Deletion**: originals are removed only after the output is written
//! - **Pluggable Decoding**: libheif behind the `heif` feature, or any [`HeifDecoder`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use heicconv::{BatchCoordinator, ConversionJob, ConversionConfig, OutputTarget};
//! use heicconv::processing::default_decoder;
//! use std::path::PathBuf;
//!
//! # async fn run() {
//! let settings = ConversionConfig { format: "png".into(), ..Default::default() };
//! let jobs = ConversionJob::batch(
//!     vec![PathBuf::from("IMG_0001.HEIC")],
//!     &OutputTarget::Adjacent,
//!     &settings,
//! );
//!
//! let coordinator = BatchCoordinator::new(default_decoder(), None);
//! let report = coordinator.run(jobs).await;
//! println!("{} converted, {} failed", report.converted, report.failed);
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod discovery;
pub mod error;
pub mod parallel;
pub mod processing;

// Re-export commonly used types
pub use config::{Config, ConversionConfig, OutputFormat};
pub use discovery::discover_sources;
pub use error::{HeicConvError, Result};
pub use parallel::{BatchCoordinator, BatchReport, JobOutcome};
pub use processing::{ConversionEngine, ConversionJob, HeifDecoder, JobStage, OutputTarget};

use tracing::debug;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global `tracing` subscriber, writing to stderr
///
/// An explicit `level` wins over `RUST_LOG`; with neither, `info` is used.
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn init_logging(level: Option<&str>, json: bool) -> Result<()> {
    init_logging_with_writer(level, json, std::io::stderr)
}

/// Like [`init_logging`], but every log line goes through `writer`
pub fn init_logging_with_writer<W>(level: Option<&str>, json: bool, writer: W) -> Result<()>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| HeicConvError::config(format!("Invalid log level '{}': {}", level, e)))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);

    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        debug!("heicconv v{} logging initialized", VERSION);
    }

    Ok(())
}
