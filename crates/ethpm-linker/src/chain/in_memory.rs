use std::collections::HashMap;

use alloy::primitives::{address, keccak256, Address, Bytes, TxHash, B256};
use error_stack::Report;
use tokio::sync::Mutex;

use super::{ChainClient, ChainFuture, DeploymentReceipt};
use crate::errors::ChainError;

/// First account of the default anvil / eth-tester mnemonic.
pub const DEFAULT_SENDER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// In-process development chain. Every transaction is mined into its own
/// block and receipts are available immediately.
#[derive(Debug)]
pub struct InMemoryChain {
    sender: Address,
    state: Mutex<ChainState>,
}

#[derive(Debug, Default)]
struct ChainState {
    nonce: u64,
    blocks: Vec<B256>,
    receipts: HashMap<TxHash, DeploymentReceipt>,
    code: HashMap<Address, Bytes>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::with_sender(DEFAULT_SENDER)
    }

    pub fn with_sender(sender: Address) -> Self {
        let genesis = keccak256(b"ethpm-linker in-memory genesis");
        Self {
            sender,
            state: Mutex::new(ChainState { blocks: vec![genesis], ..Default::default() }),
        }
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    /// Number of transactions submitted so far.
    pub async fn transaction_count(&self) -> u64 {
        self.state.lock().await.nonce
    }

    pub async fn block_number(&self) -> u64 {
        self.state.lock().await.blocks.len() as u64 - 1
    }

    /// Init code stored by the deployment that created `address`.
    pub async fn code_at(&self, address: &Address) -> Option<Bytes> {
        self.state.lock().await.code.get(address).cloned()
    }
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainClient for InMemoryChain {
    fn genesis_hash(&self) -> ChainFuture<'_, B256> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state.blocks.first().copied().ok_or_else(|| Report::new(ChainError::UnknownBlock(0)))
        })
    }

    fn block_hash(&self, block_number: u64) -> ChainFuture<'_, B256> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state
                .blocks
                .get(block_number as usize)
                .copied()
                .ok_or_else(|| Report::new(ChainError::UnknownBlock(block_number)))
        })
    }

    fn has_block(&self, block_hash: B256) -> ChainFuture<'_, bool> {
        Box::pin(async move { Ok(self.state.lock().await.blocks.contains(&block_hash)) })
    }

    fn send_deployment(&self, init_code: Bytes) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let nonce = state.nonce;
            let contract_address = self.sender.create(nonce);

            let mut preimage = self.sender.to_vec();
            preimage.extend_from_slice(&nonce.to_be_bytes());
            preimage.extend_from_slice(&init_code);
            let transaction_hash = keccak256(&preimage);

            let parent_hash = state.blocks.last().copied().unwrap_or_default();
            let block_number = state.blocks.len() as u64;
            let mut block_preimage = parent_hash.to_vec();
            block_preimage.extend_from_slice(&block_number.to_be_bytes());
            block_preimage.extend_from_slice(transaction_hash.as_slice());
            let block_hash = keccak256(&block_preimage);

            state.nonce += 1;
            state.blocks.push(block_hash);
            state.code.insert(contract_address, init_code);
            state.receipts.insert(
                transaction_hash,
                DeploymentReceipt {
                    transaction_hash,
                    block_number,
                    block_hash,
                    contract_address: Some(contract_address),
                },
            );
            Ok(transaction_hash)
        })
    }

    fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainFuture<'_, DeploymentReceipt> {
        Box::pin(async move {
            let state = self.state.lock().await;
            state
                .receipts
                .get(&tx_hash)
                .cloned()
                .ok_or_else(|| Report::new(ChainError::UnknownTransaction(tx_hash.to_string())))
        })
    }
}
