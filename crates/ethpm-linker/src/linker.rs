//! Deployment and linking steps composed into pipelines.
//!
//! ```ignore
//! let pipeline = linker![
//!     deploy("SafeSendLib", vec![]),
//!     link("Escrow", "SafeSendLib"),
//!     deploy("Escrow", vec![DynSolValue::Address(recipient)]),
//! ];
//! let Linked { package, address } = pipeline.run(package).await?;
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use alloy::dyn_abi::DynSolValue;
use alloy::hex;
use alloy::primitives::Address;
use error_stack::{Report, ResultExt};

use crate::errors::{LinkerError, LinkerErrorExt, LinkerResult};
use crate::package::Package;
use crate::utils::{
    create_deployment_data, create_latest_block_uri, get_deployment_address, insert_deployment,
};

pub type OperationFuture<'a> = Pin<Box<dyn Future<Output = LinkerResult<Linked>> + Send + 'a>>;

/// Value threaded through a pipeline: the latest package and the address
/// produced by the last deployment step, if it was one.
#[derive(Clone, Debug)]
pub struct Linked {
    pub package: Package,
    pub address: Option<Address>,
}

impl From<Package> for Linked {
    fn from(package: Package) -> Self {
        Linked { package, address: None }
    }
}

/// A configured pipeline step, applied to the output of the previous step.
pub trait Operation: Send + Sync {
    fn apply(&self, input: Linked) -> OperationFuture<'_>;
}

/// Ordered composition of operations.
#[derive(Default)]
pub struct Linker {
    operations: Vec<Box<dyn Operation>>,
}

impl Linker {
    pub fn new(operations: Vec<Box<dyn Operation>>) -> Self {
        Self { operations }
    }

    pub fn then(mut self, operation: impl Operation + 'static) -> Self {
        self.operations.push(Box::new(operation));
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Applies every operation in order; the first failure aborts the run.
    pub async fn run(&self, input: impl Into<Linked>) -> LinkerResult<Linked> {
        let mut current = input.into();
        for operation in self.operations.iter() {
            current = operation.apply(current).await?;
        }
        Ok(current)
    }
}

impl Operation for Linker {
    fn apply(&self, input: Linked) -> OperationFuture<'_> {
        Box::pin(self.run(input))
    }
}

/// Builds a [`Linker`] from a list of operations.
#[macro_export]
macro_rules! linker {
    ($($operation:expr),* $(,)?) => {
        $crate::linker::Linker::new(vec![
            $(Box::new($operation) as Box<dyn $crate::linker::Operation>),*
        ])
    };
}

pub fn linker(operations: Vec<Box<dyn Operation>>) -> Linker {
    Linker::new(operations)
}

/// Deploys `contract_name` unless the package already records a deployment
/// under that name for its chain.
#[derive(Clone, Debug)]
pub struct Deploy {
    contract_name: String,
    args: Vec<DynSolValue>,
}

pub fn deploy(contract_name: impl Into<String>, args: Vec<DynSolValue>) -> Deploy {
    Deploy { contract_name: contract_name.into(), args }
}

impl Deploy {
    async fn deploy(&self, package: Package) -> LinkerResult<Linked> {
        let name = self.contract_name.as_str();

        if let Some(address) = package.deployment_address(name) {
            let address = address.change_context(LinkerError::Manifest)?;
            package.ctx().try_log(|logger| {
                info!(logger, "{} already deployed at {}, skipping deployment", name, address)
            });
            return Ok(Linked { package, address: Some(address) });
        }

        let factory = package.contract_factory(name)?;
        let init_code = factory.deployment_data(&self.args)?;

        let client = package.client().clone();
        let tx_hash = client
            .send_deployment(init_code)
            .await
            .change_context(LinkerError::Chain)
            .attach_printable(format!("deploying {}", name))?;
        let receipt = client
            .wait_for_receipt(tx_hash)
            .await
            .change_context(LinkerError::Chain)
            .attach_printable(format!("waiting for the deployment of {}", name))?;
        let address = receipt
            .contract_address
            .ok_or_else(|| Report::new(LinkerError::MissingContractAddress(name.to_string())))?;

        let latest_block_uri = create_latest_block_uri(client.as_ref(), &receipt)
            .await
            .change_context(LinkerError::Chain)?;
        let deployment_data = create_deployment_data(name, address, &receipt);
        let manifest = insert_deployment(&package, name, deployment_data, &latest_block_uri);

        package.ctx().try_log(|logger| {
            info!(logger, "deployed {} at {} (tx {})", name, address, receipt.transaction_hash)
        });
        Ok(Linked {
            package: package.with_deployments_at(manifest, latest_block_uri),
            address: Some(address),
        })
    }
}

impl Operation for Deploy {
    fn apply(&self, input: Linked) -> OperationFuture<'_> {
        Box::pin(async move {
            self.deploy(input.package)
                .await
                .with_contract_info(self.contract_name.clone(), None)
        })
    }
}

/// Links the deployed `linked_type` into the deployment bytecode of
/// `contract`.
#[derive(Clone, Debug)]
pub struct Link {
    contract: String,
    linked_type: String,
}

pub fn link(contract: impl Into<String>, linked_type: impl Into<String>) -> Link {
    Link { contract: contract.into(), linked_type: linked_type.into() }
}

impl Link {
    fn link(&self, package: Package) -> LinkerResult<Linked> {
        let deployment_address =
            get_deployment_address(&self.contract, &self.linked_type, &package)?;

        let unlinked_factory = package.contract_factory(&self.contract)?;
        if !unlinked_factory.needs_bytecode_linking() {
            return Err(Report::new(LinkerError::NotLinkable { contract: self.contract.clone() }));
        }
        let linked_factory = unlinked_factory
            .link_bytecode(&BTreeMap::from([(self.linked_type.clone(), deployment_address)]))?;

        // TODO: also link runtime_bytecode once deployments record link_dependencies
        let linked_bytecode = hex::encode_prefixed(linked_factory.bytecode());
        let manifest = package.manifest().with_deployment_bytecode(&self.contract, linked_bytecode);

        package.ctx().try_log(|logger| {
            info!(
                logger,
                "linked {} at {} into {}", self.linked_type, deployment_address, self.contract
            )
        });
        Ok(Linked { package: package.with_manifest(manifest), address: None })
    }
}

impl Operation for Link {
    fn apply(&self, input: Linked) -> OperationFuture<'_> {
        Box::pin(async move { self.link(input.package) })
    }
}
