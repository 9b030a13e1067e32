//! heicconv CLI - Parallel HEIC to JPEG/PNG converter
//!
//! Converts one HEIC file, or every HEIC file found under a directory, into
//! JPEG or PNG using a bounded pool of concurrent workers.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::fmt::MakeWriter;

use heicconv::error::{HeicConvError, Result};
use heicconv::parallel::{ProgressTracker, ProgressUpdate};
use heicconv::processing::{default_decoder, SourceValidator};
use heicconv::{
    discover_sources, init_logging, init_logging_with_writer, BatchCoordinator, Config,
    ConversionJob, OutputFormat, OutputTarget,
};

/// heicconv - Parallel HEIC to JPEG/PNG converter
#[derive(Parser)]
#[command(
    name = "heicconv",
    version,
    about = "Convert HEIC images to JPEG or PNG in parallel",
    long_about = "heicconv converts a single HEIC file, or every HEIC file under a directory \
                  tree, into JPEG or PNG. Files are converted concurrently, one worker per \
                  CPU by default, and a failing file never stops the rest of the batch.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Single HEIC file to convert
    #[arg(long = "input_file", value_name = "FILE")]
    input_file: Option<PathBuf>,

    /// Directory to scan recursively for HEIC files
    #[arg(long = "input_dir", value_name = "DIR")]
    input_dir: Option<PathBuf>,

    /// Output file (single file mode, with a matching extension) or output directory
    #[arg(long = "output_path", value_name = "PATH")]
    output_path: Option<PathBuf>,

    /// Delete each original after it has been converted
    #[arg(long)]
    delete: bool,

    /// Output format: jpeg (default) or png
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// JPEG quality (1-100, default 80), ignored for PNG
    #[arg(long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Number of concurrent conversions (default: auto-detect)
    #[arg(short, long, value_name = "COUNT")]
    threads: Option<usize>,

    /// Configuration file path (.toml, .yaml or .yml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show what would be converted without converting anything
    #[arg(long)]
    dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Generate example configuration file
    ExampleConfig {
        /// Output file path (.toml, .yaml or .yml)
        #[arg(short, long, default_value = "heicconv.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        if let Err(e) = handle_subcommand(command) {
            eprintln!("{}: {}", style("Error").red().bold(), e.user_message());
            process::exit(1);
        }
        return;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", style("Error").red().bold(), e.user_message());
            process::exit(1);
        }
    };

    // Log lines are written around the bar while it is drawn
    let bar = ProgressBar::hidden();
    let logging = if cli.quiet || cli.json {
        init_logging(log_level(&cli, &config), config.logging.json_format)
    } else {
        init_logging_with_writer(
            log_level(&cli, &config),
            config.logging.json_format,
            BarWriter { bar: bar.clone() },
        )
    };
    if let Err(e) = logging {
        eprintln!("{}: {}", style("Error").red().bold(), e.user_message());
        process::exit(1);
    }

    if cli.input_file.is_none() && cli.input_dir.is_none() {
        print_guidance();
        process::exit(2);
    }

    match run(&cli, &config, bar).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{}: {}", style("Error").red().bold(), e.user_message());
            process::exit(1);
        }
    }
}

/// Handle subcommands
fn handle_subcommand(command: &Commands) -> Result<()> {
    match command {
        Commands::ExampleConfig { output } => generate_example_config(output),
    }
}

/// Load the config file, if any, and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(format) = &cli.format {
        config.conversion.format = format.clone();
    }
    if let Some(quality) = cli.quality {
        config.conversion.quality = quality;
    }
    if cli.delete {
        config.conversion.delete_original = true;
    }
    if let Some(threads) = cli.threads {
        config.processing.threads = Some(threads);
    }

    config.validate()?;
    Ok(config)
}

/// Verbosity flags win, then the config file, then `RUST_LOG`
fn log_level<'a>(cli: &Cli, config: &'a Config) -> Option<&'a str> {
    if cli.quiet {
        Some("error")
    } else if cli.verbose {
        Some("debug")
    } else if cli.config.is_some() {
        Some(config.logging.level.as_str())
    } else {
        None
    }
}

fn print_guidance() {
    eprintln!(
        "{}: no input given. Use --input_file <FILE> to convert a single image \
         or --input_dir <DIR> to convert every HEIC file under a directory.",
        style("Usage").yellow().bold()
    );
    eprintln!("Run with --help for usage information");
}

/// Discover, convert and report; returns whether every job succeeded
async fn run(cli: &Cli, config: &Config, bar: ProgressBar) -> Result<bool> {
    let single_file = cli.input_file.is_some();
    if single_file && cli.input_dir.is_some() {
        warn!("Both --input_file and --input_dir given, converting --input_file only");
    }

    let sources = collect_sources(cli, config).await?;

    let format_hint = config.conversion.format.parse::<OutputFormat>().ok();
    let target = OutputTarget::from_output_path(cli.output_path.as_deref(), single_file, format_hint);
    let jobs = ConversionJob::batch(sources, &target, &config.conversion);

    info!("Found {} files to convert", jobs.len());

    if cli.dry_run {
        print_dry_run(&jobs);
        return Ok(true);
    }

    let coordinator = BatchCoordinator::new(default_decoder(), Some(config.processing.parallelism()));

    let progress_task = if cli.quiet || cli.json {
        None
    } else {
        Some(spawn_progress_bar(bar, coordinator.progress(), jobs.len())?)
    };

    let report = coordinator.run(jobs).await;

    if let Some(task) = progress_task {
        let _ = task.await;
    }

    if cli.json {
        // Keep stdout parseable
        eprintln!("All conversions completed.");
        let json = report
            .to_json()
            .map_err(|e| HeicConvError::SerdeError(format!("JSON serialization failed: {}", e)))?;
        println!("{}", json);
    } else {
        println!("All conversions completed.");
        report.print_summary();
    }

    Ok(!report.has_failures())
}

/// The files to convert: the single input file, or everything under the input directory
async fn collect_sources(cli: &Cli, config: &Config) -> Result<Vec<PathBuf>> {
    if let Some(file) = &cli.input_file {
        SourceValidator::new().validate_path(file).await?;
        return Ok(vec![file.clone()]);
    }

    let Some(dir) = cli.input_dir.clone() else {
        return Ok(Vec::new());
    };

    info!("Scanning {} for HEIC files", dir.display());
    let extensions = config.processing.extensions.clone();
    tokio::task::spawn_blocking(move || discover_sources(&dir, &extensions))
        .await
        .map_err(|e| HeicConvError::system(format!("Task join error: {}", e)))?
}

fn print_dry_run(jobs: &[ConversionJob]) {
    println!("{} files would be converted:", style(jobs.len()).bold());
    for job in jobs {
        match job.output_format() {
            Ok(format) => println!(
                "  {} -> {}",
                job.source.display(),
                job.output_path(format).display()
            ),
            Err(e) => println!(
                "  {} -> {}",
                job.source.display(),
                style(e.user_message()).red()
            ),
        }
    }
}

/// Drive the bar from the tracker's update stream until the batch completes
fn spawn_progress_bar(
    pb: ProgressBar,
    tracker: Arc<ProgressTracker>,
    total: usize,
) -> Result<JoinHandle<()>> {
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {prefix} {msg}")
            .map_err(|e| HeicConvError::system(format!("Invalid progress template: {}", e)))?
            .progress_chars("#>-"),
    );
    pb.set_length(total as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());

    let mut updates = tracker.subscribe();
    Ok(tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(ProgressUpdate::StageChanged { source, stage }) => {
                    pb.set_message(format!("{} {}", stage, file_label(&source)));
                }
                Ok(ProgressUpdate::JobFinished { .. }) => {
                    let state = tracker.get_state();
                    pb.set_position(state.finished() as u64);
                    pb.set_prefix(format!("{:.0}%", state.completion_percentage()));
                }
                Ok(ProgressUpdate::BatchCompleted { final_state }) => {
                    pb.set_position(final_state.finished() as u64);
                    break;
                }
                Ok(ProgressUpdate::Started { .. }) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
        pb.finish_and_clear();
    }))
}

/// `tracing` writer that hides the progress bar while a log line is printed
#[derive(Clone)]
struct BarWriter {
    bar: ProgressBar,
}

impl<'a> MakeWriter<'a> for BarWriter {
    type Writer = BarLine;

    fn make_writer(&'a self) -> Self::Writer {
        BarLine {
            bar: self.bar.clone(),
            buf: Vec::new(),
        }
    }
}

/// One formatted log event, flushed to stderr when dropped
struct BarLine {
    bar: ProgressBar,
    buf: Vec<u8>,
}

impl io::Write for BarLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BarLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        self.bar.suspend(|| {
            let _ = io::stderr().write_all(&buf);
        });
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Generate example configuration file
fn generate_example_config(output_path: &Path) -> Result<()> {
    let config = Config::default();
    config.to_file(output_path)?;

    println!(
        "{}: Generated example configuration: {}",
        style("Success").green().bold(),
        output_path.display()
    );

    Ok(())
}
