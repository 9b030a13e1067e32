//! Source file validation

use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{HeicConvError, Result};
use crate::processing::formats::{is_heif_container, sniff_mime_type};

/// Checks applied to a source before it reaches the codec
pub struct SourceValidator {
    max_file_size: u64,
}

impl SourceValidator {
    /// Create a new validator with default limits
    pub fn new() -> Self {
        Self {
            max_file_size: 500 * 1024 * 1024, // 500MB
        }
    }

    /// Create a validator with a custom size limit
    pub fn with_limit(max_file_size_mb: u64) -> Self {
        Self {
            max_file_size: max_file_size_mb * 1024 * 1024,
        }
    }

    /// Check that `path` names an existing regular file
    pub async fn validate_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HeicConvError::file_not_found(path));
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() {
            return Err(HeicConvError::invalid_parameters(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        Ok(())
    }

    /// Check the bytes of a source before decoding
    pub fn check_container(&self, data: &[u8], path: &Path) -> Result<()> {
        debug!("Validating container: {:?} ({} bytes)", path, data.len());

        if data.is_empty() {
            return Err(HeicConvError::decode("file is empty", Some(path.to_path_buf())));
        }

        if data.len() as u64 > self.max_file_size {
            return Err(HeicConvError::decode(
                format!(
                    "file is too large ({:.2} MB, limit {:.2} MB)",
                    data.len() as f64 / 1024.0 / 1024.0,
                    self.max_file_size as f64 / 1024.0 / 1024.0
                ),
                Some(path.to_path_buf()),
            ));
        }

        if !is_heif_container(data) {
            let message = match sniff_mime_type(data) {
                Some(mime) => format!("not a HEIF container (looks like {})", mime),
                None => "not a HEIF container".to_string(),
            };
            return Err(HeicConvError::decode(message, Some(path.to_path_buf())));
        }

        Ok(())
    }
}

impl Default for SourceValidator {
    fn default() -> Self {
        Self::new()
    }
}
