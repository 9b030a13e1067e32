//! Convert one HEIC file next to itself

use heicconv::processing::default_decoder;
use heicconv::{init_logging, ConversionConfig, ConversionEngine, ConversionJob, OutputTarget};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(Some("info"), false)?;

    let source = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("IMG_0001.HEIC"));

    let settings = ConversionConfig {
        format: "png".to_string(),
        ..ConversionConfig::default()
    };
    let job = ConversionJob::new(source, OutputTarget::Adjacent, &settings);

    let engine = ConversionEngine::new(default_decoder());
    let result = engine.convert(&job).await?;

    println!("Converted {}:", result.source.display());
    println!("  Output: {}", result.output.display());
    println!("  Size: {}x{}", result.width, result.height);
    println!(
        "  Written: {:.2} KB in {:.2}s",
        result.bytes_written as f64 / 1024.0,
        result.processing_time.as_secs_f64()
    );

    Ok(())
}
