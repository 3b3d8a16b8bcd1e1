//! Builds, signs and submits EIP-1559 transactions from the deployer wallet.

use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEip1559};
use alloy_core::primitives::{Address, Bytes, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;

use crate::{
    chain::{ChainClient, DEFAULT_RECEIPT_POLL_INTERVAL, PendingTransaction},
    units::{display_ether, gwei_to_wei},
};

/// Default gas limit when neither the step, the project nor the settings provide one.
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Fee settings of the deployer wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeConfig {
    /// Max fee per gas in gwei.
    pub max_fee_per_gas: f64,
    /// Max priority fee per gas in gwei.
    pub max_priority_fee_per_gas: f64,
    /// Gas limit used when a step does not set one.
    pub max_gas_limit: Option<u64>,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            max_fee_per_gas: 20.0,
            max_priority_fee_per_gas: 1.2,
            max_gas_limit: Some(DEFAULT_GAS_LIMIT),
        }
    }
}

/// Wallet state tracked across a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletState {
    pub address: Address,
    pub balance: U256,
    /// Next transaction nonce, incremented locally after every submission.
    pub nonce: u64,
}

/// Signs and publishes transactions for a single wallet.
///
/// The nonce is read once at construction and then tracked locally, so steps can be
/// submitted back to back without waiting for receipts. A failed submission leaves the
/// local nonce unchanged and must abort the run.
#[derive(Debug)]
pub struct TransactionBuilder<C> {
    client: C,
    signer: PrivateKeySigner,
    chain_id: u64,
    wallet: WalletState,
    fees: FeeConfig,
    poll_interval: Duration,
}

impl<C: ChainClient> TransactionBuilder<C> {
    /// Query chain id, balance and nonce of the wallet.
    pub async fn new(client: C, signer: PrivateKeySigner, fees: FeeConfig) -> anyhow::Result<Self> {
        let address = signer.address();
        let (chain_id, balance, nonce) = futures::try_join!(
            client.chain_id(),
            client.balance(address),
            client.transaction_count(address),
        )
        .context("Failed to initialize deployer wallet")?;

        tracing::info!(
            wallet = %address,
            balance = %display_ether(balance),
            nonce,
            chain_id,
            "Deployer wallet ready"
        );

        Ok(Self {
            client,
            signer,
            chain_id,
            wallet: WalletState {
                address,
                balance,
                nonce,
            },
            fees,
            poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        })
    }

    /// Set the interval between receipt polls of submitted transactions.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn wallet(&self) -> &WalletState {
        &self.wallet
    }

    pub fn address(&self) -> Address {
        self.wallet.address
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Gas limit for a step without its own override.
    fn gas_limit(&self, gas_limit: Option<u64>) -> u64 {
        gas_limit
            .or(self.fees.max_gas_limit)
            .unwrap_or(DEFAULT_GAS_LIMIT)
    }

    /// Sign a transaction with the current local nonce and submit it.
    ///
    /// Returns as soon as the node accepted the transaction. The nonce is advanced only
    /// then.
    pub async fn send(
        &mut self,
        to: Address,
        value: U256,
        input: Bytes,
        gas_limit: Option<u64>,
    ) -> anyhow::Result<PendingTransaction<C>> {
        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: self.wallet.nonce,
            gas_limit: self.gas_limit(gas_limit),
            max_fee_per_gas: gwei_to_wei(self.fees.max_fee_per_gas),
            max_priority_fee_per_gas: gwei_to_wei(self.fees.max_priority_fee_per_gas),
            to: TxKind::Call(to),
            value,
            access_list: Default::default(),
            input,
        };

        let signature = self
            .signer
            .sign_hash_sync(&tx.signature_hash())
            .context("Failed to sign transaction")?;
        let raw: Bytes = tx.into_signed(signature).encoded_2718().into();

        let hash = self
            .client
            .send_raw_transaction(raw)
            .await
            .with_context(|| {
                format!("Failed to submit transaction with nonce {}", self.wallet.nonce)
            })?;

        tracing::debug!(tx_hash = %hash, nonce = self.wallet.nonce, %to, "Transaction submitted");
        self.wallet.nonce += 1;

        Ok(PendingTransaction::new(hash, self.client.clone(), self.poll_interval))
    }

    /// Publish a pre-signed transaction. The local nonce is not touched.
    pub async fn publish_raw(&self, raw: Bytes) -> anyhow::Result<PendingTransaction<C>> {
        let hash = self
            .client
            .send_raw_transaction(raw)
            .await
            .context("Failed to publish raw transaction")?;

        Ok(PendingTransaction::new(hash, self.client.clone(), self.poll_interval))
    }
}
