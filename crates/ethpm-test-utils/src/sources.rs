use std::path::{Path, PathBuf};

use error_stack::Report;
use walkdir::WalkDir;

use crate::config::SourcesPattern;
use crate::errors::{FixtureError, FixtureResult};

/// Contract sources under `contracts_dir` matching `pattern`, in path order.
pub fn discover_sources(
    contracts_dir: &Path,
    pattern: &SourcesPattern,
) -> FixtureResult<Vec<PathBuf>> {
    if !contracts_dir.is_dir() {
        return Err(Report::new(FixtureError::MissingContractsDir {
            path: contracts_dir.to_path_buf(),
        }));
    }

    let max_depth = if pattern.recursive { usize::MAX } else { 1 };
    let mut sources: Vec<PathBuf> = WalkDir::new(contracts_dir)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == pattern.extension.as_str()))
        .map(|e| e.into_path())
        .collect();
    sources.sort();
    Ok(sources)
}

/// Contract type name for a source file: its file stem.
pub fn contract_type_name(source: &Path) -> Option<String> {
    source.file_stem().and_then(|stem| stem.to_str()).map(|stem| stem.to_string())
}
