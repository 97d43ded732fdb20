use std::fmt;

use error_stack::Report;

/// Failures raised while composing deployment and linking steps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkerError {
    /// The dependency has no deployment recorded for the package's chain.
    #[error("no deployment of '{dependency}' found, deploy it before linking '{contract}'")]
    MissingDependency { contract: String, dependency: String },
    /// The target contract has no unresolved link references.
    #[error("contract type '{contract}' has no unlinked references, it cannot be linked")]
    NotLinkable { contract: String },
    /// A deployment was requested for a contract that still needs linking.
    #[error("unable to deploy unlinked contract type '{contract}', register a strategy for it")]
    UnlinkedDeployment { contract: String },
    #[error("contract type '{0}' not found in package")]
    UnknownContractType(String),
    #[error("contract type '{0}' has no deployment bytecode")]
    MissingBytecode(String),
    /// The link reference name is not declared by the contract type.
    #[error("contract type '{contract}' has no link reference named '{reference}'")]
    UnknownLinkReference { contract: String, reference: String },
    #[error("link reference '{reference}' of '{contract}' is out of bounds or not address sized")]
    InvalidLinkReference { contract: String, reference: String },
    #[error("invalid constructor arguments for '{0}'")]
    ConstructorArguments(String),
    #[error("deployment receipt for '{0}' carries no contract address")]
    MissingContractAddress(String),
    #[error("manifest update failed")]
    Manifest,
    #[error("chain client failure")]
    Chain,
}

/// Failures raised while parsing, building or validating a manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("unsupported manifest version '{0}', expected '2'")]
    UnsupportedVersion(String),
    #[error("invalid package name '{0}'")]
    InvalidPackageName(String),
    #[error("package version must not be empty")]
    EmptyVersion,
    #[error("invalid contract type name '{0}'")]
    InvalidContractTypeName(String),
    #[error("bytecode of '{contract}' is not valid hex")]
    InvalidBytecode { contract: String },
    #[error("link reference '{reference}' of '{contract}' exceeds the bytecode length")]
    LinkReferenceOutOfBounds { contract: String, reference: String },
    #[error("invalid block uri '{0}'")]
    InvalidBlockUri(String),
    #[error("deployment '{deployment}' references undeclared contract type '{contract_type}'")]
    UndeclaredContractType { deployment: String, contract_type: String },
    #[error("deployment '{deployment}' has an invalid address '{address}'")]
    InvalidAddress { deployment: String, address: String },
    #[error("contract type '{0}' not found in compiler output")]
    MissingCompilerOutput(String),
    #[error("unable to read source file for '{0}'")]
    UnreadableSource(String),
    #[error("manifest is not valid json")]
    Json,
}

/// Failures surfaced by a chain client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("invalid rpc url '{0}'")]
    InvalidUrl(String),
    #[error("rpc node error: {0}")]
    NodeError(String),
    #[error("block {0} not found")]
    UnknownBlock(u64),
    #[error("no unlocked account available to send transactions")]
    NoAccounts,
    #[error("transaction {0} not found")]
    UnknownTransaction(String),
    #[error("timed out waiting for receipt of transaction {0}")]
    ReceiptTimeout(String),
}

pub type LinkerResult<T> = Result<T, Report<LinkerError>>;
pub type ManifestResult<T> = Result<T, Report<ManifestError>>;
pub type ChainResult<T> = Result<T, Report<ChainError>>;

/// RPC request details attached to chain client failures
#[derive(Debug, Clone)]
pub struct RpcContext {
    pub endpoint: String,
    pub method: String,
    pub params: Option<String>,
}

impl fmt::Display for RpcContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {} at {}", self.method, self.endpoint)?;
        if let Some(params) = &self.params {
            write!(f, " params: {}", params)?;
        }
        Ok(())
    }
}

/// Contract details attached to linker failures
#[derive(Debug, Clone)]
pub struct ContractInfo {
    pub name: String,
    pub address: Option<String>,
}

impl fmt::Display for ContractInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Contract: {}", self.name)?;
        if let Some(addr) = &self.address {
            write!(f, " at {}", addr)?;
        }
        Ok(())
    }
}

pub trait LinkerErrorExt {
    /// Attach the contract a failing step was working on
    fn with_contract_info(self, name: impl Into<String>, address: Option<String>) -> Self;
}

impl<T> LinkerErrorExt for LinkerResult<T> {
    fn with_contract_info(self, name: impl Into<String>, address: Option<String>) -> Self {
        self.map_err(|e| e.attach(ContractInfo { name: name.into(), address }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::ResultExt;

    #[test]
    fn test_missing_dependency_message_names_both_contracts() {
        let error = LinkerError::MissingDependency {
            contract: "Escrow".to_string(),
            dependency: "SafeSendLib".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("Escrow"));
        assert!(message.contains("SafeSendLib"));
    }

    #[test]
    fn test_chain_failure_keeps_original_report() {
        let result: ChainResult<()> =
            Err(Report::new(ChainError::NodeError("connection refused".to_string())));
        let error = result.change_context(LinkerError::Chain).unwrap_err();

        assert_eq!(error.current_context(), &LinkerError::Chain);
        assert!(error.contains::<ChainError>());
        assert_eq!(
            error.downcast_ref::<ChainError>(),
            Some(&ChainError::NodeError("connection refused".to_string()))
        );
    }

    #[test]
    fn test_contract_info_attachment() {
        let result: LinkerResult<()> =
            Err(Report::new(LinkerError::UnknownContractType("Wallet".to_string())));
        let error = result.with_contract_info("Wallet", None).unwrap_err();

        let info = error.downcast_ref::<ContractInfo>().unwrap();
        assert_eq!(info.name, "Wallet");
        assert!(info.address.is_none());
    }
}
