//! Output path derivation

use std::path::{Path, PathBuf};

use crate::config::OutputFormat;

/// Where a job's output lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Next to the source file
    Adjacent,
    /// Under the given directory, named after the source
    Directory(PathBuf),
    /// Exactly this file (single-file mode only)
    File(PathBuf),
}

impl OutputTarget {
    /// Interpret an `--output_path` value
    ///
    /// A path whose extension matches the output format names a file; anything
    /// else is treated as a directory.
    pub fn from_output_path(path: Option<&Path>, single_file: bool, format: Option<OutputFormat>) -> Self {
        let Some(path) = path else {
            return Self::Adjacent;
        };

        let names_file = single_file
            && match (format, path.extension().and_then(|ext| ext.to_str())) {
                (Some(format), Some(ext)) => format.matches_extension(ext),
                _ => false,
            };

        if names_file {
            Self::File(path.to_path_buf())
        } else {
            Self::Directory(path.to_path_buf())
        }
    }
}

/// Derive the output file name for `source`
///
/// The first `.` of the base name becomes `_` and the format suffix is
/// appended, so `IMG_0001.HEIC` turns into `IMG_0001_HEIC.jpg`.
pub fn output_file_name(source: &Path, format: OutputFormat) -> String {
    let base = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    format!("{}.{}", base.replacen('.', "_", 1), format.extension())
}

/// Resolve the full output path for `source`
pub fn resolve_output_path(source: &Path, target: &OutputTarget, format: OutputFormat) -> PathBuf {
    match target {
        OutputTarget::File(path) => path.clone(),
        OutputTarget::Directory(dir) => dir.join(output_file_name(source, format)),
        OutputTarget::Adjacent => {
            let name = output_file_name(source, format);
            match source.parent() {
                Some(parent) => parent.join(name),
                None => PathBuf::from(name),
            }
        }
    }
}
