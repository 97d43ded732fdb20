use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use error_stack::{Report, ResultExt};

use crate::errors::{FixtureError, FixtureResult};

pub const DEFAULT_PACKAGE_ROOT: &str = ".";
pub const DEFAULT_CONTRACTS_DIR: &str = "./contracts";
pub const DEFAULT_SOURCES_GLOB: &str = "**/*.vy";

/// Test session configuration, usually read from `ethpm-fixtures.toml`.
///
/// ```toml
/// package_root = "."
/// contracts_dir = "./contracts"
/// sources_glob = "**/*.vy"
/// package_name = "greeter"
///
/// [compiler]
/// program = "vyper"
///
/// [chain]
/// rpc_url = "http://127.0.0.1:8545"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    /// Directory inline sources are keyed relative to
    pub package_root: PathBuf,
    /// Resolved against `package_root`
    pub contracts_dir: PathBuf,
    pub sources_glob: String,
    pub package_name: String,
    pub version: String,
    pub manifest_version: String,
    pub compiler: CompilerConfig,
    pub chain: ChainConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub program: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Dev node to deploy to; the in-memory chain is used when unset
    pub rpc_url: Option<String>,
    pub poll_interval_ms: u64,
    pub receipt_timeout_ms: u64,
}

/// Parsed `sources_glob`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourcesPattern {
    pub recursive: bool,
    pub extension: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            package_root: PathBuf::from(DEFAULT_PACKAGE_ROOT),
            contracts_dir: PathBuf::from(DEFAULT_CONTRACTS_DIR),
            sources_glob: DEFAULT_SOURCES_GLOB.to_string(),
            package_name: "greeter".to_string(),
            version: "1.0.0".to_string(),
            manifest_version: "2".to_string(),
            compiler: CompilerConfig::default(),
            chain: ChainConfig::default(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self { program: "vyper".to_string() }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { rpc_url: None, poll_interval_ms: 100, receipt_timeout_ms: 120_000 }
    }
}

impl ChainConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }
}

impl FixtureConfig {
    pub fn load(path: &Path) -> FixtureResult<Self> {
        let content = fs::read_to_string(path)
            .change_context(FixtureError::Config { path: path.to_path_buf() })?;
        Self::from_toml(&content).attach_printable(format!("loading {}", path.display()))
    }

    pub fn from_toml(content: &str) -> FixtureResult<Self> {
        toml::from_str(content)
            .change_context(FixtureError::Config { path: PathBuf::from("<inline>") })
    }

    pub fn with_package_root(self, package_root: impl Into<PathBuf>) -> Self {
        Self { package_root: package_root.into(), ..self }
    }

    pub fn with_contracts_dir(self, contracts_dir: impl Into<PathBuf>) -> Self {
        Self { contracts_dir: contracts_dir.into(), ..self }
    }

    /// Contracts directory as seen from the working directory.
    pub fn contracts_path(&self) -> PathBuf {
        self.package_root.join(&self.contracts_dir)
    }

    pub fn sources_pattern(&self) -> FixtureResult<SourcesPattern> {
        let invalid =
            || Report::new(FixtureError::InvalidSourcesPattern(self.sources_glob.clone()));

        let (recursive, file_pattern) = match self.sources_glob.strip_prefix("**/") {
            Some(rest) => (true, rest),
            None => (false, self.sources_glob.as_str()),
        };
        let extension = file_pattern.strip_prefix("*.").ok_or_else(invalid)?;
        if extension.is_empty() || extension.contains(['*', '/', '?']) {
            return Err(invalid());
        }
        Ok(SourcesPattern { recursive, extension: extension.to_string() })
    }
}
