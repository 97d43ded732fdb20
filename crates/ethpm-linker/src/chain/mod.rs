use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use alloy::primitives::{Address, Bytes, TxHash, B256};

use crate::errors::ChainResult;

mod in_memory;
pub mod rpc;

pub use in_memory::InMemoryChain;
pub use rpc::RpcChainClient;

pub type ChainFuture<'a, T> = Pin<Box<dyn Future<Output = ChainResult<T>> + Send + 'a>>;

/// Receipt fields the linker relies on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub block_hash: B256,
    pub contract_address: Option<Address>,
}

/// Handle used to submit deployments and query the chain.
///
/// Waiting, timeouts and transport failures are the client's concern; callers
/// propagate whatever report it produces.
pub trait ChainClient: Debug + Send + Sync {
    fn genesis_hash(&self) -> ChainFuture<'_, B256>;

    fn block_hash(&self, block_number: u64) -> ChainFuture<'_, B256>;

    /// Whether a block with this hash is part of the chain.
    fn has_block(&self, block_hash: B256) -> ChainFuture<'_, bool>;

    /// Submits a contract creation transaction carrying `init_code`.
    fn send_deployment(&self, init_code: Bytes) -> ChainFuture<'_, TxHash>;

    /// Blocks until the receipt of `tx_hash` is available.
    fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainFuture<'_, DeploymentReceipt>;
}
