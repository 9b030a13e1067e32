//! Convert a directory of HEIC files with four concurrent workers

use heicconv::processing::default_decoder;
use heicconv::{
    discover_sources, init_logging, BatchCoordinator, ConversionConfig, ConversionJob,
    OutputTarget,
};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(Some("info"), false)?;

    let input_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("photos"));

    let sources = discover_sources(&input_dir, &["heic".to_string()])?;
    println!("Converting {} files...", sources.len());

    let jobs = ConversionJob::batch(
        sources,
        &OutputTarget::Directory(PathBuf::from("converted")),
        &ConversionConfig::default(),
    );

    let coordinator = BatchCoordinator::new(default_decoder(), Some(4));
    let report = coordinator.run(jobs).await;

    report.print_summary();

    Ok(())
}
