use alloy::primitives::Address;
use error_stack::{Report, ResultExt};

use crate::chain::{ChainClient, DeploymentReceipt};
use crate::errors::{ChainResult, LinkerError, LinkerResult};
use crate::manifest::{Deployment, Manifest};
use crate::package::Package;
use crate::uri::create_block_uri;

/// Block uri of the block that includes `receipt`, on the client's chain.
pub async fn create_latest_block_uri(
    client: &dyn ChainClient,
    receipt: &DeploymentReceipt,
) -> ChainResult<String> {
    let chain_id = client.genesis_hash().await?;
    let block_hash = client.block_hash(receipt.block_number).await?;
    Ok(create_block_uri(chain_id, block_hash))
}

pub fn create_deployment_data(
    contract_name: &str,
    address: Address,
    receipt: &DeploymentReceipt,
) -> Deployment {
    Deployment {
        contract_type: contract_name.to_string(),
        address: address.to_checksum(None),
        transaction: Some(receipt.transaction_hash.to_string()),
        block: Some(receipt.block_hash.to_string()),
        runtime_bytecode: None,
    }
}

/// Address `linked_type` is deployed at on the package's chain.
pub fn get_deployment_address(
    contract: &str,
    linked_type: &str,
    package: &Package,
) -> LinkerResult<Address> {
    match package.deployment_address(linked_type) {
        Some(address) => address.change_context(LinkerError::Manifest),
        None => Err(Report::new(LinkerError::MissingDependency {
            contract: contract.to_string(),
            dependency: linked_type.to_string(),
        })),
    }
}

/// New manifest with `deployment_data` recorded under `latest_block_uri`.
/// Records already stored for the package's chain move to the new uri.
pub fn insert_deployment(
    package: &Package,
    deployment_name: &str,
    deployment_data: Deployment,
    latest_block_uri: &str,
) -> Manifest {
    let mut deployments = package.deployments();
    deployments.insert(deployment_name.to_string(), deployment_data);
    package.manifest().with_chain_deployments(
        package.deployments_uri(),
        latest_block_uri,
        deployments,
    )
}
