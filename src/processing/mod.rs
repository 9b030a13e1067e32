//! Per-file conversion pipeline

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::{ConversionConfig, OutputFormat};
use crate::error::{ErrorContext, HeicConvError, Result};

pub mod codec;
pub mod formats;
pub mod naming;
pub mod validation;

pub use codec::*;
pub use formats::*;
pub use naming::*;
pub use validation::*;

/// One source file to convert, immutable once built
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub source: PathBuf,
    pub target: OutputTarget,
    /// Requested output format, resolved when the job runs
    pub format: String,
    pub quality: u8,
    pub delete_original: bool,
}

impl ConversionJob {
    pub fn new(source: PathBuf, target: OutputTarget, settings: &ConversionConfig) -> Self {
        Self {
            source,
            target,
            format: settings.format.clone(),
            quality: settings.quality,
            delete_original: settings.delete_original,
        }
    }

    /// Build one job per source, all sharing the same target and settings
    pub fn batch(
        sources: Vec<PathBuf>,
        target: &OutputTarget,
        settings: &ConversionConfig,
    ) -> Vec<Self> {
        sources
            .into_iter()
            .map(|source| Self::new(source, target.clone(), settings))
            .collect()
    }

    /// Resolve the requested format name
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format
            .parse::<OutputFormat>()
            .with_file_context(self.source.clone())
    }

    /// Where the output of this job lands for `format`
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        resolve_output_path(&self.source, &self.target, format)
    }
}

/// Lifecycle of a job; `Failed` is entered from Decoding, Encoding or Writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Queued,
    SlotReserved,
    AwaitingStart,
    Decoding,
    Encoding,
    Writing,
    Deleting,
    Done,
    Failed,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::SlotReserved => "slot reserved",
            Self::AwaitingStart => "awaiting start",
            Self::Decoding => "decoding",
            Self::Encoding => "encoding",
            Self::Writing => "writing",
            Self::Deleting => "deleting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A job error together with the stage it stopped in
#[derive(Debug)]
pub struct JobFailure {
    pub stage: JobStage,
    pub error: HeicConvError,
}

impl JobFailure {
    pub fn at(stage: JobStage, error: HeicConvError) -> Self {
        Self { stage, error }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for JobFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub bytes_written: u64,
    pub source_deleted: bool,
    /// Deletion failures never undo the conversion
    pub delete_error: Option<String>,
    pub processing_time: Duration,
}

/// Runs the decode, encode, write and delete steps for one job
pub struct ConversionEngine {
    decoder: Arc<dyn HeifDecoder>,
    validator: SourceValidator,
}

impl ConversionEngine {
    pub fn new(decoder: Arc<dyn HeifDecoder>) -> Self {
        Self {
            decoder,
            validator: SourceValidator::new(),
        }
    }

    pub fn with_validator(decoder: Arc<dyn HeifDecoder>, validator: SourceValidator) -> Self {
        Self { decoder, validator }
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    /// Convert a single job
    ///
    /// Nothing is written unless decoding and encoding both succeed, and the
    /// source is only removed after the output is on disk.
    pub async fn convert(&self, job: &ConversionJob) -> std::result::Result<ConversionResult, JobFailure> {
        self.convert_observed(job, |_| {}).await
    }

    /// Convert a single job, reporting every stage it enters to `on_stage`
    pub async fn convert_observed<F>(
        &self,
        job: &ConversionJob,
        on_stage: F,
    ) -> std::result::Result<ConversionResult, JobFailure>
    where
        F: Fn(JobStage) + Send + Sync,
    {
        let start_time = Instant::now();
        let source = job.source.as_path();

        debug!("Converting {:?} ({:?})", source, job.target);

        on_stage(JobStage::Decoding);
        let decoded = self
            .decode(source)
            .await
            .map_err(|e| JobFailure::at(JobStage::Decoding, e))?;

        info!(
            "Converting file: {} image size: {} × {}",
            source.display(),
            decoded.width(),
            decoded.height()
        );

        let format = job
            .output_format()
            .map_err(|e| JobFailure::at(JobStage::Encoding, e))?;
        let output = job.output_path(format);

        let (width, height) = (decoded.width(), decoded.height());
        on_stage(JobStage::Encoding);
        let bytes = self
            .encode(decoded, format, job.quality, source)
            .await
            .map_err(|e| JobFailure::at(JobStage::Encoding, e))?;

        on_stage(JobStage::Writing);
        write_output(&output, &bytes)
            .await
            .map_err(|e| JobFailure::at(JobStage::Writing, e))?;
        info!("HEIC image saved as {}", output.display());

        let (source_deleted, delete_error) = if job.delete_original {
            on_stage(JobStage::Deleting);
            match fs::remove_file(source).await {
                Ok(()) => {
                    info!("Deleted original file: {}", source.display());
                    (true, None)
                }
                Err(e) => {
                    let error = HeicConvError::delete(source.to_path_buf(), e);
                    warn!("{}", error);
                    (false, Some(error.to_string()))
                }
            }
        } else {
            (false, None)
        };
        on_stage(JobStage::Done);

        Ok(ConversionResult {
            source: source.to_path_buf(),
            output,
            format,
            width,
            height,
            bytes_written: bytes.len() as u64,
            source_deleted,
            delete_error,
            processing_time: start_time.elapsed(),
        })
    }

    /// Read, sniff and decode a source on the blocking pool
    async fn decode(&self, source: &Path) -> Result<DecodedImage> {
        let data = fs::read(source).await.map_err(|e| {
            HeicConvError::context_creation(
                format!("could not read file: {}", e),
                Some(source.to_path_buf()),
            )
        })?;

        self.validator.check_container(&data, source)?;

        let decoder = Arc::clone(&self.decoder);
        let path = source.to_path_buf();
        tokio::task::spawn_blocking(move || decoder.decode(&data, &path))
            .await
            .map_err(|e| HeicConvError::system(format!("Task join error: {}", e)))?
    }

    async fn encode(
        &self,
        decoded: DecodedImage,
        format: OutputFormat,
        quality: u8,
        source: &Path,
    ) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || encode(decoded.raster(), format, quality))
            .await
            .map_err(|e| HeicConvError::system(format!("Task join error: {}", e)))?
            .with_file_context(source.to_path_buf())
    }
}

/// Write encoded bytes, creating the parent directory and replacing any existing file
async fn write_output(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| HeicConvError::write(output.to_path_buf(), e))?;
        }
    }

    fs::write(output, bytes)
        .await
        .map_err(|e| HeicConvError::write(output.to_path_buf(), e))
}
