//! Manifest assembly as a pipeline of build steps:
//!
//! ```ignore
//! let manifest = build(
//!     Manifest::default(),
//!     vec![package_name("greeter"), version("1.0.0"), manifest_version("2"), validate()],
//! )?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};

use super::compiler_output::{find_contract, CompilerOutput};
use super::Manifest;
use crate::errors::{ManifestError, ManifestResult};

pub type BuildStep = Box<dyn Fn(Manifest) -> ManifestResult<Manifest> + Send + Sync>;

pub fn build(
    initial: Manifest,
    steps: impl IntoIterator<Item = BuildStep>,
) -> ManifestResult<Manifest> {
    steps.into_iter().try_fold(initial, |manifest, step| step(manifest))
}

pub fn package_name(name: impl Into<String>) -> BuildStep {
    let name = name.into();
    Box::new(move |manifest| Ok(manifest.with_package_name(name.clone())))
}

pub fn version(version: impl Into<String>) -> BuildStep {
    let version = version.into();
    Box::new(move |manifest| Ok(manifest.with_version(version.clone())))
}

pub fn manifest_version(manifest_version: impl Into<String>) -> BuildStep {
    let manifest_version = manifest_version.into();
    Box::new(move |manifest| Ok(manifest.with_manifest_version(manifest_version.clone())))
}

/// Inlines the source file that declares `name`. The file is read relative to
/// `package_root` and stored under `./<path>`.
pub fn inline_source(
    name: impl Into<String>,
    output: &CompilerOutput,
    package_root: impl Into<PathBuf>,
) -> BuildStep {
    let name = name.into();
    let source_path = find_contract(output, &name).map(|(path, _)| path.to_string());
    let package_root = package_root.into();

    Box::new(move |manifest| {
        let source_path = source_path
            .as_deref()
            .ok_or_else(|| Report::new(ManifestError::MissingCompilerOutput(name.clone())))?;
        let relative_path = source_path.trim_start_matches("./");
        let source = read_source(&package_root.join(relative_path), &name)?;
        Ok(manifest.with_source(format!("./{}", relative_path), source))
    })
}

pub fn contract_type(name: impl Into<String>, output: &CompilerOutput) -> BuildStep {
    let name = name.into();
    let asset = find_contract(output, &name).map(|(_, asset)| asset.clone());

    Box::new(move |manifest| {
        let asset = asset
            .as_ref()
            .ok_or_else(|| Report::new(ManifestError::MissingCompilerOutput(name.clone())))?;
        Ok(manifest.with_contract_type(name.clone(), asset.to_contract_type(&name)?))
    })
}

pub fn validate() -> BuildStep {
    Box::new(|manifest| {
        manifest.validate()?;
        Ok(manifest)
    })
}

fn read_source(path: &Path, name: &str) -> ManifestResult<String> {
    fs::read_to_string(path)
        .change_context(ManifestError::UnreadableSource(name.to_string()))
        .attach_printable(format!("reading {}", path.display()))
}
