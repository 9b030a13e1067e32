//! Error types and handling for heicconv

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for heicconv operations
pub type Result<T> = std::result::Result<T, HeicConvError>;

/// Main error type for heicconv operations
#[derive(Debug, Error)]
pub enum HeicConvError {
    /// I/O related errors without a more specific classification
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Input file or directory does not exist
    #[error("Input path does not exist: {path:?}")]
    FileNotFound { path: PathBuf },

    /// Directory walk failed
    #[error("Failed to traverse {path:?}: {message}")]
    TraversalError { message: String, path: Option<PathBuf> },

    /// Decoding context could not be created or the source could not be read
    #[error("Could not create decoding context: {message} (file: {file:?})")]
    ContextCreationError { message: String, file: Option<PathBuf> },

    /// Primary image handle retrieval or pixel decode failed
    #[error("Could not decode image: {message} (file: {file:?})")]
    DecodeError { message: String, file: Option<PathBuf> },

    /// Requested output format is not one we can encode
    #[error("Unsupported format: {format} (file: {file:?})")]
    UnsupportedFormat { format: String, file: Option<PathBuf> },

    /// Raster encoder rejected the image
    #[error("Could not encode image as {format}: {message} (file: {file:?})")]
    EncodeError {
        format: String,
        message: String,
        file: Option<PathBuf>,
    },

    /// Writing the encoded output failed
    #[error("Could not save image as {file:?}: {source}")]
    WriteError {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing the source file after conversion failed
    #[error("Failed to delete original file {file:?}: {source}")]
    DeleteError {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid conversion parameters
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// System resource errors
    #[error("System resource error: {message}")]
    SystemError { message: String },
}

impl HeicConvError {
    /// Create a new file not found error
    pub fn file_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new traversal error
    pub fn traversal<S: Into<String>>(message: S, path: Option<PathBuf>) -> Self {
        Self::TraversalError {
            message: message.into(),
            path,
        }
    }

    /// Create a new context creation error
    pub fn context_creation<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::ContextCreationError {
            message: message.into(),
            file,
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S, file: Option<PathBuf>) -> Self {
        Self::DecodeError {
            message: message.into(),
            file,
        }
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S, file: Option<PathBuf>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            file,
        }
    }

    /// Create a new encode error
    pub fn encode<F: Into<String>, S: Into<String>>(
        format: F,
        message: S,
        file: Option<PathBuf>,
    ) -> Self {
        Self::EncodeError {
            format: format.into(),
            message: message.into(),
            file,
        }
    }

    pub fn write(file: PathBuf, source: std::io::Error) -> Self {
        Self::WriteError { file, source }
    }

    pub fn delete(file: PathBuf, source: std::io::Error) -> Self {
        Self::DeleteError { file, source }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new invalid parameters error
    pub fn invalid_parameters<S: Into<String>>(message: S) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create a new system error
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::SystemError {
            message: message.into(),
        }
    }

    /// The file this error is about, if known
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::TraversalError { path: file, .. }
            | Self::ContextCreationError { file, .. }
            | Self::DecodeError { file, .. }
            | Self::UnsupportedFormat { file, .. }
            | Self::EncodeError { file, .. } => file.as_ref(),

            Self::FileNotFound { path } => Some(path),
            Self::WriteError { file, .. } | Self::DeleteError { file, .. } => Some(file),

            _ => None,
        }
    }

    /// Message shown on the console and recorded in job outcomes
    pub fn user_message(&self) -> String {
        match self {
            Self::IoError(e) => format!("File system error: {}", e),
            Self::FileNotFound { path } => {
                format!("Input '{}' does not exist", path.display())
            }
            Self::UnsupportedFormat { format, .. } => {
                format!("Unsupported format: {}. Supported formats: jpeg, png", format)
            }
            Self::DecodeError { message, file: Some(file) } => {
                format!("Could not decode {}: {}", file.display(), message)
            }
            Self::ContextCreationError { message, file: Some(file) } => {
                format!("Could not read file {}: {}", file.display(), message)
            }
            other => other.to_string(),
        }
    }
}

impl From<image::ImageError> for HeicConvError {
    fn from(err: image::ImageError) -> Self {
        Self::encode("image", err.to_string(), None)
    }
}

impl From<walkdir::Error> for HeicConvError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        Self::traversal(err.to_string(), path)
    }
}

impl From<toml::de::Error> for HeicConvError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for HeicConvError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}

/// Error context extension for adding file path information
pub trait ErrorContext<T> {
    /// Add file context to an error
    fn with_file_context(self, file: PathBuf) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<HeicConvError>,
{
    fn with_file_context(self, file: PathBuf) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();

            // Add file context if not already present
            match &mut error {
                HeicConvError::TraversalError { path: ref mut f, .. }
                | HeicConvError::ContextCreationError { file: ref mut f, .. }
                | HeicConvError::DecodeError { file: ref mut f, .. }
                | HeicConvError::UnsupportedFormat { file: ref mut f, .. }
                | HeicConvError::EncodeError { file: ref mut f, .. } => {
                    if f.is_none() {
                        *f = Some(file);
                    }
                }
                _ => {}
            }

            error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = HeicConvError::config("test message");
        assert!(matches!(err, HeicConvError::ConfigError { .. }));
    }

    #[test]
    fn test_user_messages() {
        let err = HeicConvError::unsupported_format("gif", None);
        let msg = err.user_message();
        assert!(msg.contains("gif"));
        assert!(msg.contains("jpeg, png"));

        let err = HeicConvError::decode("truncated", Some(PathBuf::from("a.heic")));
        assert_eq!(err.user_message(), "Could not decode a.heic: truncated");
    }

    #[test]
    fn test_file_context() {
        let result: std::result::Result<(), HeicConvError> =
            Err(HeicConvError::encode("png", "boom", None));
        let err = result.with_file_context(PathBuf::from("x.heic")).unwrap_err();
        assert_eq!(err.file_path(), Some(&PathBuf::from("x.heic")));

        // Existing context is preserved
        let result: std::result::Result<(), HeicConvError> =
            Err(HeicConvError::decode("boom", Some(PathBuf::from("first.heic"))));
        let err = result.with_file_context(PathBuf::from("second.heic")).unwrap_err();
        assert_eq!(err.file_path(), Some(&PathBuf::from("first.heic")));
    }

    #[test]
    fn test_write_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = HeicConvError::write(PathBuf::from("out.png"), io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("out.png"));
    }
}
