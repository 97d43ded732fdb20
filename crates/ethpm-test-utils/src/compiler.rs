use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use alloy::json_abi::JsonAbi;
use error_stack::{Report, ResultExt};
use ethpm_linker::manifest::builder::{self, BuildStep};
use ethpm_linker::manifest::compiler_output::{
    CompilerOutput, RawBytecode, RawContractAsset, RawEvmOutput,
};

use crate::errors::{FixtureError, FixtureResult};
use crate::sources::contract_type_name;

/// Turns a single contract source file into its abi and bytecode.
pub trait Compiler: Send + Sync {
    fn compile(&self, source_path: &Path) -> FixtureResult<RawContractAsset>;
}

/// Runs the `vyper` command line compiler.
#[derive(Clone, Debug)]
pub struct VyperCompiler {
    pub program: String,
}

impl VyperCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn compiler_error(&self, source_path: &Path) -> FixtureError {
        FixtureError::Compiler {
            program: self.program.clone(),
            source_path: source_path.to_path_buf(),
        }
    }
}

impl Default for VyperCompiler {
    fn default() -> Self {
        Self::new("vyper")
    }
}

impl Compiler for VyperCompiler {
    fn compile(&self, source_path: &Path) -> FixtureResult<RawContractAsset> {
        let output = Command::new(&self.program)
            .args(["-f", "abi,bytecode"])
            .arg(source_path)
            .output()
            .change_context(self.compiler_error(source_path))?;

        if !output.status.success() {
            return Err(Report::new(self.compiler_error(source_path))
                .attach_printable(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        parse_vyper_output(&String::from_utf8_lossy(&output.stdout), source_path)
    }
}

/// `vyper -f abi,bytecode` prints the abi json and the bytecode on separate
/// lines.
pub fn parse_vyper_output(stdout: &str, source_path: &Path) -> FixtureResult<RawContractAsset> {
    let output_error = || FixtureError::CompilerOutput { source_path: source_path.to_path_buf() };

    let mut lines = stdout.lines().map(str::trim).filter(|line| !line.is_empty());
    let (Some(abi), Some(bytecode)) = (lines.next(), lines.next()) else {
        return Err(Report::new(output_error()).attach_printable("expected abi and bytecode lines"));
    };
    let abi: JsonAbi = serde_json::from_str(abi).change_context(output_error())?;
    if !bytecode.starts_with("0x") {
        return Err(Report::new(output_error())
            .attach_printable(format!("invalid bytecode: {}", bytecode)));
    }

    Ok(create_raw_asset_data(abi, bytecode))
}

pub fn create_raw_asset_data(abi: JsonAbi, bytecode: &str) -> RawContractAsset {
    RawContractAsset {
        abi,
        evm: RawEvmOutput {
            bytecode: RawBytecode {
                object: bytecode.to_string(),
                link_references: BTreeMap::new(),
            },
            deployed_bytecode: None,
        },
    }
}

/// Compiles every source, keyed by its path relative to `package_root`.
/// Each file yields a single contract type named after the file stem.
pub fn generate_compiler_output(
    sources: &[PathBuf],
    package_root: &Path,
    compiler: &dyn Compiler,
) -> FixtureResult<CompilerOutput> {
    let mut output = CompilerOutput::new();
    for source in sources.iter() {
        let contract_type = contract_type_name(source).ok_or_else(|| {
            Report::new(FixtureError::CompilerOutput { source_path: source.clone() })
        })?;
        let relative_path = source.strip_prefix(package_root).unwrap_or(source);
        let key = relative_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let asset = compiler.compile(source)?;
        output.insert(key, BTreeMap::from([(contract_type, asset)]));
    }
    Ok(output)
}

pub fn generate_contract_types(output: &CompilerOutput) -> Vec<BuildStep> {
    output
        .values()
        .flat_map(|contracts| contracts.keys())
        .map(|name| builder::contract_type(name.clone(), output))
        .collect()
}

pub fn generate_inline_sources(output: &CompilerOutput, package_root: &Path) -> Vec<BuildStep> {
    output
        .values()
        .flat_map(|contracts| contracts.keys())
        .map(|name| builder::inline_source(name.clone(), output, package_root))
        .collect()
}
