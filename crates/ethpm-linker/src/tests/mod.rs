// Pipeline level tests against the in-memory chain

mod deployer_tests;
mod linker_tests;

use std::sync::Arc;

use alloy::primitives::{Bytes, TxHash, B256};
use error_stack::Report;

use crate::chain::{ChainClient, ChainFuture, DeploymentReceipt, InMemoryChain};
use crate::context::Context;
use crate::errors::ChainError;
use crate::manifest::Manifest;
use crate::package::Package;

/// `Escrow` links against `SafeSendLib` at byte offset 3 and takes the
/// recipient address as constructor argument. `Owned` needs no linking.
pub const ESCROW_MANIFEST: &str = r#"{
    "manifest_version": "2",
    "package_name": "escrow",
    "version": "1.0.0",
    "sources": {
        "./SafeSendLib.sol": "library SafeSendLib {}",
        "./Escrow.sol": "contract Escrow {}",
        "./Owned.sol": "contract Owned {}"
    },
    "contract_types": {
        "SafeSendLib": {
            "abi": [],
            "deployment_bytecode": {"bytecode": "0x606060405260"}
        },
        "Owned": {
            "abi": [],
            "deployment_bytecode": {"bytecode": "0x6060604052600080"}
        },
        "Escrow": {
            "abi": [
                {
                    "type": "constructor",
                    "inputs": [{"name": "recipient", "type": "address"}],
                    "stateMutability": "nonpayable"
                }
            ],
            "deployment_bytecode": {
                "bytecode": "0x60606073000000000000000000000000000000000000000060405260",
                "link_references": [{"offsets": [4], "length": 20, "name": "SafeSendLib"}]
            },
            "runtime_bytecode": {
                "bytecode": "0x6060730000000000000000000000000000000000000000",
                "link_references": [{"offsets": [3], "length": 20, "name": "SafeSendLib"}]
            }
        }
    }
}"#;

pub fn escrow_manifest() -> Manifest {
    Manifest::from_json(ESCROW_MANIFEST).unwrap()
}

pub async fn escrow_package() -> (Package, Arc<InMemoryChain>) {
    let chain = Arc::new(InMemoryChain::new());
    let client: Arc<dyn ChainClient> = chain.clone();
    let package = Package::new(escrow_manifest(), client, Context::empty()).await.unwrap();
    (package, chain)
}

/// Chain whose node rejects every transaction.
#[derive(Debug)]
pub struct RejectingChain;

impl ChainClient for RejectingChain {
    fn genesis_hash(&self) -> ChainFuture<'_, B256> {
        Box::pin(async { Ok(B256::repeat_byte(0x42)) })
    }

    fn block_hash(&self, block_number: u64) -> ChainFuture<'_, B256> {
        Box::pin(async move { Err(Report::new(ChainError::UnknownBlock(block_number))) })
    }

    fn has_block(&self, _block_hash: B256) -> ChainFuture<'_, bool> {
        Box::pin(async { Ok(false) })
    }

    fn send_deployment(&self, _init_code: Bytes) -> ChainFuture<'_, TxHash> {
        Box::pin(async {
            Err(Report::new(ChainError::NodeError("insufficient funds for gas".to_string())))
        })
    }

    fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainFuture<'_, DeploymentReceipt> {
        Box::pin(async move {
            Err(Report::new(ChainError::UnknownTransaction(tx_hash.to_string())))
        })
    }
}
