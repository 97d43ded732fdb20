use std::time::{Duration, Instant};

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, B256};
use alloy::providers::fillers::{
    BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
};
use alloy::providers::{Identity, Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use error_stack::{Report, ResultExt};

use super::{ChainClient, ChainFuture, DeploymentReceipt};
use crate::errors::{ChainError, ChainResult, RpcContext};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

pub type RecommendedProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider,
>;

/// Chain client backed by a JSON-RPC development node (anvil, hardhat).
/// Transactions are sent from the node's first unlocked account.
#[derive(Clone, Debug)]
pub struct RpcChainClient {
    pub url: Url,
    pub provider: RecommendedProvider,
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(url: &str) -> ChainResult<Self> {
        let url = Url::try_from(url).map_err(|e| {
            Report::new(ChainError::InvalidUrl(url.to_string())).attach_printable(e.to_string())
        })?;

        let provider = ProviderBuilder::new().on_http(url.clone());
        Ok(Self {
            url,
            provider,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        })
    }

    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self { poll_interval, ..self }
    }

    pub fn with_receipt_timeout(self, receipt_timeout: Duration) -> Self {
        Self { receipt_timeout, ..self }
    }

    fn rpc_context(&self, method: &str, params: Option<String>) -> RpcContext {
        RpcContext { endpoint: self.url.to_string(), method: method.to_string(), params }
    }

    async fn get_block_hash(&self, block_number: u64) -> ChainResult<B256> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await
            .map_err(|e| Report::new(ChainError::NodeError(e.to_string())))
            .attach(self.rpc_context(
                "eth_getBlockByNumber",
                Some(format!("[\"{:#x}\", false]", block_number)),
            ))?;
        block
            .map(|block| block.header.hash)
            .ok_or_else(|| Report::new(ChainError::UnknownBlock(block_number)))
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> ChainResult<Option<DeploymentReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| Report::new(ChainError::NodeError(e.to_string())))
            .attach(self.rpc_context(
                "eth_getTransactionReceipt",
                Some(format!("[\"{}\"]", tx_hash)),
            ))?;

        Ok(receipt.and_then(|receipt| {
            settled_receipt(
                receipt.transaction_hash,
                receipt.block_number,
                receipt.block_hash,
                receipt.contract_address,
            )
        }))
    }
}

/// Receipts are only usable once they carry the block that includes them.
fn settled_receipt(
    transaction_hash: TxHash,
    block_number: Option<u64>,
    block_hash: Option<B256>,
    contract_address: Option<Address>,
) -> Option<DeploymentReceipt> {
    Some(DeploymentReceipt {
        transaction_hash,
        block_number: block_number?,
        block_hash: block_hash?,
        contract_address,
    })
}

impl ChainClient for RpcChainClient {
    fn genesis_hash(&self) -> ChainFuture<'_, B256> {
        Box::pin(self.get_block_hash(0))
    }

    fn block_hash(&self, block_number: u64) -> ChainFuture<'_, B256> {
        Box::pin(self.get_block_hash(block_number))
    }

    fn has_block(&self, block_hash: B256) -> ChainFuture<'_, bool> {
        Box::pin(async move {
            let block = self
                .provider
                .get_block_by_hash(block_hash)
                .await
                .map_err(|e| Report::new(ChainError::NodeError(e.to_string())))
                .attach(self.rpc_context(
                    "eth_getBlockByHash",
                    Some(format!("[\"{}\", false]", block_hash)),
                ))?;
            Ok(block.is_some())
        })
    }

    fn send_deployment(&self, init_code: Bytes) -> ChainFuture<'_, TxHash> {
        Box::pin(async move {
            let accounts = self
                .provider
                .get_accounts()
                .await
                .map_err(|e| Report::new(ChainError::NodeError(e.to_string())))
                .attach(self.rpc_context("eth_accounts", None))?;
            let from = *accounts.first().ok_or_else(|| Report::new(ChainError::NoAccounts))?;

            let tx = TransactionRequest::default().with_from(from).with_deploy_code(init_code);
            let pending_tx = self
                .provider
                .send_transaction(tx)
                .await
                .map_err(|e| Report::new(ChainError::NodeError(e.to_string())))
                .attach(self.rpc_context("eth_sendTransaction", Some(format!("from {}", from))))
                .attach_printable("Failed to send deployment transaction")?;
            Ok(*pending_tx.tx_hash())
        })
    }

    fn wait_for_receipt(&self, tx_hash: TxHash) -> ChainFuture<'_, DeploymentReceipt> {
        Box::pin(async move {
            let started = Instant::now();
            loop {
                if let Some(receipt) = self.get_receipt(tx_hash).await? {
                    return Ok(receipt);
                }
                if started.elapsed() >= self.receipt_timeout {
                    return Err(Report::new(ChainError::ReceiptTimeout(tx_hash.to_string()))
                        .attach_printable(format!(
                            "no receipt after {}ms",
                            self.receipt_timeout.as_millis()
                        )));
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers every JSON-RPC call with the canned result for its method,
    /// `null` for unknown methods. Returns the node url.
    async fn serve_rpc(results: HashMap<&'static str, Value>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let results = results.clone();
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        let read = match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(read) => read,
                        };
                        buffer.extend_from_slice(&chunk[..read]);
                        while let Some(request) = take_request_body(&mut buffer) {
                            let request: Value = serde_json::from_slice(&request).unwrap();
                            let method = request["method"].as_str().unwrap_or_default();
                            let body = json!({
                                "jsonrpc": "2.0",
                                "id": request["id"],
                                "result": results.get(method).cloned().unwrap_or(Value::Null),
                            })
                            .to_string();
                            let response = format!(
                                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                                 content-length: {}\r\n\r\n{}",
                                body.len(),
                                body
                            );
                            if stream.write_all(response.as_bytes()).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        url
    }

    /// Pops one complete HTTP request off `buffer` and returns its body.
    fn take_request_body(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        let header_end = buffer.windows(4).position(|window| window == b"\r\n\r\n")? + 4;
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buffer.len() < header_end + content_length {
            return None;
        }
        let request: Vec<u8> = buffer.drain(..header_end + content_length).collect();
        Some(request[header_end..].to_vec())
    }

    #[test]
    fn test_rejects_invalid_url() {
        let error = RpcChainClient::new("not a url").unwrap_err();
        assert_eq!(error.current_context(), &ChainError::InvalidUrl("not a url".to_string()));
    }

    #[test]
    fn test_builder_overrides_timings() {
        let client = RpcChainClient::new("http://127.0.0.1:8545")
            .unwrap()
            .with_poll_interval(Duration::from_millis(5))
            .with_receipt_timeout(Duration::from_secs(1));
        assert_eq!(client.poll_interval, Duration::from_millis(5));
        assert_eq!(client.receipt_timeout, Duration::from_secs(1));
        assert_eq!(client.url.as_str(), "http://127.0.0.1:8545/");
    }

    #[test]
    fn test_pending_receipt_is_not_settled() {
        let tx_hash = TxHash::repeat_byte(0x01);
        assert!(settled_receipt(tx_hash, None, None, None).is_none());
        assert!(settled_receipt(tx_hash, Some(3), None, None).is_none());

        let receipt =
            settled_receipt(tx_hash, Some(3), Some(B256::repeat_byte(0x02)), Some(Address::ZERO))
                .unwrap();
        assert_eq!(receipt.block_number, 3);
        assert_eq!(receipt.contract_address, Some(Address::ZERO));
    }

    #[tokio::test]
    async fn test_deployment_requires_an_unlocked_account() {
        let url = serve_rpc(HashMap::from([("eth_accounts", json!([]))])).await;
        let client = RpcChainClient::new(&url).unwrap();

        let error = client.send_deployment(Bytes::from_static(&[0x60, 0x60])).await.unwrap_err();
        assert_eq!(error.current_context(), &ChainError::NoAccounts);
    }

    #[tokio::test]
    async fn test_missing_receipt_times_out() {
        let url = serve_rpc(HashMap::from([("eth_getTransactionReceipt", Value::Null)])).await;
        let client = RpcChainClient::new(&url)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
            .with_receipt_timeout(Duration::from_millis(50));

        let error = client.wait_for_receipt(TxHash::ZERO).await.unwrap_err();
        assert_eq!(error.current_context(), &ChainError::ReceiptTimeout(TxHash::ZERO.to_string()));
    }

    #[tokio::test]
    async fn test_unknown_block_hash() {
        let url = serve_rpc(HashMap::from([("eth_getBlockByHash", Value::Null)])).await;
        let client = RpcChainClient::new(&url).unwrap();

        assert!(!client.has_block(B256::repeat_byte(0x33)).await.unwrap());
    }
}
