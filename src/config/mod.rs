//! Configuration management for heicconv

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HeicConvError, Result};
use crate::processing::formats::DEFAULT_SOURCE_EXTENSION;

/// Everything a run can be configured with; each section falls back to its defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults for every conversion job
    pub conversion: ConversionConfig,

    /// Worker pool and discovery settings
    pub processing: ProcessingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Per-job conversion defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Output format name (`jpeg` or `png`)
    pub format: String,

    /// JPEG quality (1-100), ignored for PNG
    pub quality: u8,

    /// Remove the source file after a successful conversion
    pub delete_original: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg.name().to_string(),
            quality: 80,
            delete_original: false,
        }
    }
}

/// Worker pool and discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of concurrency slots (None = available parallelism)
    pub threads: Option<usize>,

    /// Source file extensions matched during discovery, case-insensitive
    pub extensions: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            threads: None,
            extensions: vec![DEFAULT_SOURCE_EXTENSION.to_string()],
        }
    }
}

impl ProcessingConfig {
    /// Slot pool capacity, falling back to the host's logical CPU count
    pub fn parallelism(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Raster formats a decoded image can be written as
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Suffix appended to output names
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Canonical name as accepted on the command line
    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// Match an output path's extension against this format
    pub fn matches_extension(self, extension: &str) -> bool {
        match self {
            Self::Jpeg => {
                extension.eq_ignore_ascii_case("jpg") || extension.eq_ignore_ascii_case("jpeg")
            }
            Self::Png => extension.eq_ignore_ascii_case("png"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = HeicConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(HeicConvError::unsupported_format(other, None)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Config {
    /// Load a TOML or YAML config, picked by file extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            HeicConvError::config(format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension.to_lowercase().as_str() {
            "toml" => toml::from_str(&content).map_err(Into::into),
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(Into::into),
            _ => Err(HeicConvError::config(
                "Unsupported config file format. Use .toml or .yaml",
            )),
        }
    }

    /// Write this config as TOML or YAML, picked by file extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        let content = match extension.to_lowercase().as_str() {
            "toml" => toml::to_string_pretty(self).map_err(|e| {
                HeicConvError::config(format!("TOML serialization failed: {}", e))
            })?,
            "yaml" | "yml" => serde_yaml::to_string(self).map_err(|e| {
                HeicConvError::config(format!("YAML serialization failed: {}", e))
            })?,
            _ => {
                return Err(HeicConvError::config(
                    "Unsupported config file format. Use .toml or .yaml",
                ))
            }
        };

        std::fs::write(&path, content).map_err(|e| {
            HeicConvError::config(format!(
                "Failed to write config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// The output format is not checked here; an unknown format fails each
    /// job that uses it.
    pub fn validate(&self) -> Result<()> {
        validate_quality(self.conversion.quality)?;

        if let Some(threads) = self.processing.threads {
            if threads == 0 {
                return Err(HeicConvError::config("Thread count must be greater than 0"));
            }
        }

        if self.processing.extensions.is_empty() {
            return Err(HeicConvError::config(
                "At least one source extension must be configured",
            ));
        }

        if self
            .processing
            .extensions
            .iter()
            .any(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(HeicConvError::config(
                "Source extensions must be non-empty and given without a leading '.'",
            ));
        }

        Ok(())
    }
}

/// Check a JPEG quality value
pub fn validate_quality(quality: u8) -> Result<()> {
    if quality == 0 || quality > 100 {
        return Err(HeicConvError::invalid_parameters(format!(
            "Quality must be between 1-100, got {}",
            quality
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.conversion.format, "jpeg");
        assert_eq!(config.conversion.quality, 80);
        assert!(!config.conversion.delete_original);
        assert_eq!(config.processing.extensions, vec!["heic"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.conversion.quality, config.conversion.quality);

        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(parsed.processing.extensions, config.processing.extensions);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[conversion]\nformat = \"png\"\n").unwrap();
        assert_eq!(parsed.conversion.format, "png");
        assert_eq!(parsed.conversion.quality, 80);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_config_file_io() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();

        let toml_path = dir.path().join("heicconv.toml");
        config.to_file(&toml_path).unwrap();
        assert!(Config::from_file(&toml_path).unwrap().validate().is_ok());

        let yaml_path = dir.path().join("heicconv.yaml");
        config.to_file(&yaml_path).unwrap();
        assert!(Config::from_file(&yaml_path).unwrap().validate().is_ok());

        let bad_path = dir.path().join("heicconv.ini");
        assert!(config.to_file(&bad_path).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.conversion.quality = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.conversion.quality = 101;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.threads = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.extensions.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.extensions = vec![".heic".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("JPG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert!(matches!(
            "gif".parse::<OutputFormat>(),
            Err(HeicConvError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_output_format_properties() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert!(OutputFormat::Jpeg.matches_extension("JPEG"));
        assert!(!OutputFormat::Png.matches_extension("jpg"));
    }

    #[test]
    fn test_parallelism() {
        let mut processing = ProcessingConfig::default();
        assert!(processing.parallelism() >= 1);
        processing.threads = Some(3);
        assert_eq!(processing.parallelism(), 3);
    }
}
