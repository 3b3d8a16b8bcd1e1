//! Chain access used by the deployment engine.
//!
//! Every RPC interaction goes through [`ChainClient`], which is explicitly constructed and
//! passed down the call graph. [`crate::rpc::RpcClient`] is the JSON-RPC implementation.

use std::{future::Future, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default interval between receipt polls.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Read and write access to an execution-layer node.
pub trait ChainClient: Clone + Send + Sync + 'static {
    /// The chain id of the connected network.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Balance of `address` in wei at the latest block.
    fn balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Transaction count (account nonce) of `address` at the latest block.
    fn transaction_count(&self, address: Address) -> impl Future<Output = Result<u64>> + Send;

    /// Deployed bytecode at `address`.
    fn code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Execute a read-only call against `to`.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = Result<Bytes>> + Send;

    /// Submit a fully signed, serialized transaction. Resolves once the node accepted it.
    fn send_raw_transaction(&self, raw: Bytes) -> impl Future<Output = Result<B256>> + Send;

    /// Receipt of a mined transaction, `None` while it is still pending.
    fn transaction_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>>> + Send;
}

/// Subset of the JSON-RPC transaction receipt used by the deployer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<U64>,
    /// `0x1` on success, `0x0` if the transaction reverted.
    pub status: Option<U64>,
    pub gas_used: Option<U256>,
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    /// Whether the transaction executed successfully.
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status == U64::from(1))
    }
}

/// A transaction accepted by the node whose receipt has not been observed yet.
///
/// The hash is available immediately after submission; the receipt is a separate
/// future obtained through [`PendingTransaction::confirmed`].
#[derive(Debug, Clone)]
pub struct PendingTransaction<C> {
    hash: B256,
    client: C,
    poll_interval: Duration,
}

impl<C: ChainClient> PendingTransaction<C> {
    pub fn new(hash: B256, client: C, poll_interval: Duration) -> Self {
        Self {
            hash,
            client,
            poll_interval,
        }
    }

    /// The transaction hash returned by the node.
    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Wait until the transaction is mined.
    ///
    /// Fails if the receipt reports a reverted execution or if the node returns an error.
    pub async fn confirmed(self) -> Result<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.client.transaction_receipt(self.hash).await? {
                if !receipt.succeeded() {
                    anyhow::bail!("Transaction {} reverted", self.hash);
                }

                tracing::debug!(
                    tx_hash = %self.hash,
                    block_number = ?receipt.block_number,
                    "Transaction confirmed"
                );
                return Ok(receipt);
            }

            tracing::trace!(tx_hash = %self.hash, "Receipt not available yet, polling...");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;

    #[test]
    fn test_receipt_status() {
        let mut receipt = TransactionReceipt {
            transaction_hash: B256::ZERO,
            block_number: Some(U64::from(1)),
            status: Some(U64::from(1)),
            gas_used: None,
            contract_address: None,
        };
        assert!(receipt.succeeded());

        receipt.status = Some(U64::ZERO);
        assert!(!receipt.succeeded());

        receipt.status = None;
        assert!(receipt.succeeded());
    }

    #[test]
    fn test_receipt_deserialize() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x1b4",
            "status": "0x1",
            "gasUsed": "0x5208",
            "contractAddress": null,
            "logs": []
        }))
        .unwrap();

        assert_eq!(receipt.block_number, Some(U64::from(0x1b4)));
        assert_eq!(receipt.gas_used, Some(U256::from(21000)));
        assert!(receipt.succeeded());
    }

    #[tokio::test]
    async fn test_confirmed_waits_for_receipt() {
        let chain = MockChain::default();
        let hash = chain
            .send_raw_transaction(Bytes::from_static(b"raw"))
            .await
            .unwrap();
        chain.delay_receipts(2);

        let pending = PendingTransaction::new(hash, chain.clone(), Duration::from_millis(1));
        let receipt = pending.confirmed().await.unwrap();

        assert_eq!(receipt.transaction_hash, hash);
        assert_eq!(chain.receipt_polls(), 3);
    }

    #[tokio::test]
    async fn test_confirmed_fails_on_revert() {
        let chain = MockChain::default();
        let hash = chain
            .send_raw_transaction(Bytes::from_static(b"raw"))
            .await
            .unwrap();
        chain.revert(hash);

        let pending = PendingTransaction::new(hash, chain, Duration::from_millis(1));
        assert!(pending.confirmed().await.is_err());
    }
}
