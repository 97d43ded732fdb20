use std::collections::HashMap;
use std::fmt;

use alloy::dyn_abi::DynSolValue;
use error_stack::Report;

use crate::errors::{LinkerError, LinkerResult};
use crate::linker::{deploy, Linked, Operation};
use crate::package::Package;

/// Deploys contract types of a package, delegating contract types that need
/// linking to registered strategies.
pub struct Deployer {
    package: Package,
    strategies: HashMap<String, Box<dyn Operation>>,
}

impl Deployer {
    pub fn new(package: Package) -> Self {
        Self { package, strategies: HashMap::new() }
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Operation used in place of a plain deployment of `contract_type`,
    /// typically a linker that deploys and links its dependencies first.
    pub fn register_strategy(
        &mut self,
        contract_type: impl Into<String>,
        strategy: impl Operation + 'static,
    ) {
        self.strategies.insert(contract_type.into(), Box::new(strategy));
    }

    pub fn has_strategy(&self, contract_type: &str) -> bool {
        self.strategies.contains_key(contract_type)
    }

    pub async fn deploy(
        &self,
        contract_type: &str,
        args: Vec<DynSolValue>,
    ) -> LinkerResult<Linked> {
        let factory = self.package.contract_factory(contract_type)?;

        if let Some(strategy) = self.strategies.get(contract_type) {
            return strategy.apply(self.package.clone().into()).await;
        }
        if factory.needs_bytecode_linking() {
            return Err(Report::new(LinkerError::UnlinkedDeployment {
                contract: contract_type.to_string(),
            }));
        }
        deploy(contract_type, args).apply(self.package.clone().into()).await
    }
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut strategies: Vec<&String> = self.strategies.keys().collect();
        strategies.sort();
        f.debug_struct("Deployer")
            .field("package", &self.package)
            .field("strategies", &strategies)
            .finish()
    }
}
