use std::path::PathBuf;

use error_stack::Report;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixtureError {
    #[error("no contracts directory found at '{}'", path.display())]
    MissingContractsDir { path: PathBuf },
    #[error("unsupported sources pattern '{0}', expected '*.<ext>' or '**/*.<ext>'")]
    InvalidSourcesPattern(String),
    #[error("failed to read fixture config '{}'", path.display())]
    Config { path: PathBuf },
    #[error("compiler '{program}' failed on '{}'", source_path.display())]
    Compiler { program: String, source_path: PathBuf },
    #[error("unexpected compiler output for '{}'", source_path.display())]
    CompilerOutput { source_path: PathBuf },
    #[error("failed to assemble package manifest")]
    Manifest,
    #[error("failed to set up package")]
    Package,
    #[error("failed to connect chain client")]
    Chain,
}

pub type FixtureResult<T> = Result<T, Report<FixtureError>>;
