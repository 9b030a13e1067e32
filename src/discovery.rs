//! Recursive source file discovery

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{HeicConvError, Result};
use crate::processing::formats::is_source_extension;

/// Find every regular file under `root` whose extension is one of `extensions`
///
/// Entries are visited in lexical order. The first traversal error aborts the
/// walk and is returned; nothing is skipped silently.
pub fn discover_sources<P: AsRef<Path>>(root: P, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();

    if !root.exists() {
        return Err(HeicConvError::file_not_found(root));
    }
    if !root.is_dir() {
        return Err(HeicConvError::invalid_parameters(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut sources = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;

        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| is_source_extension(ext, extensions));

        if matches {
            sources.push(entry.into_path());
        }
    }

    debug!("Discovered {} source files under {:?}", sources.len(), root);
    Ok(sources)
}
