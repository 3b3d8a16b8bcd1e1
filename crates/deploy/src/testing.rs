//! In-memory chain and fixtures for unit tests.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::{Arc, Mutex},
};

use alloy_consensus::{TxEip1559, TxEnvelope};
use alloy_core::{
    primitives::{Address, B256, Bytes, U64, U256, keccak256},
    sol_types::{SolCall, SolValue},
};
use alloy_eips::eip2718::Decodable2718;
use alloy_signer_local::PrivateKeySigner;

use crate::{
    chain::{ChainClient, TransactionReceipt},
    manager::{IDeploymentAccount, IDeploymentManager},
};

/// First anvil development key, `0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266`.
pub const DEV_KEY_0: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Second anvil development key, `0x70997970C51812dc3A010C7d01b50e0d17dc79C8`.
pub const DEV_KEY_1: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn dev_signer(key: &str) -> PrivateKeySigner {
    key.parse().unwrap()
}

/// Write `<root>/<name>/deployment.yaml`.
pub fn write_project(root: &Path, name: &str, yaml: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(crate::project::DEFINITION_FILE), yaml).unwrap();
}

/// Observable chain activity, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Sent(B256),
    Receipt(B256),
}

#[derive(Debug)]
struct MockState {
    chain_id: u64,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
    deployers: HashMap<(Address, U256), Address>,
    call_nonces: HashMap<Address, u128>,
    sent: Vec<Bytes>,
    events: Vec<ChainEvent>,
    receipt_delay: usize,
    pending: HashMap<B256, usize>,
    mined: HashSet<B256>,
    reverted: HashSet<B256>,
    receipt_polls: usize,
    fail_sends: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            balances: HashMap::new(),
            nonces: HashMap::new(),
            code: HashMap::new(),
            deployers: HashMap::new(),
            call_nonces: HashMap::new(),
            sent: Vec::new(),
            events: Vec::new(),
            receipt_delay: 0,
            pending: HashMap::new(),
            mined: HashSet::new(),
            reverted: HashSet::new(),
            receipt_polls: 0,
            fail_sends: false,
        }
    }
}

/// [`ChainClient`] backed by in-memory state.
///
/// Transactions are accepted with `keccak256(raw)` as their hash and mined on the first
/// receipt poll unless receipts are delayed.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.with_state(|s| s.balances.insert(address, balance));
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.with_state(|s| s.nonces.insert(address, nonce));
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.with_state(|s| s.code.insert(address, code));
    }

    /// Give `address` placeholder runtime code so calls to it are answered.
    pub fn set_contract(&self, address: Address) {
        self.set_code(address, Bytes::from_static(&[0x60]));
    }

    /// Register the deployer the manager reports for `(account, salt)`.
    pub fn set_deployer(&self, account: Address, salt: U256, deployer: Address) {
        self.with_state(|s| s.deployers.insert((account, salt), deployer));
    }

    /// Set the executed step count of a deployer account, which then has code.
    pub fn set_call_nonce(&self, deployer: Address, nonce: u128) {
        self.with_state(|s| {
            s.code.entry(deployer).or_insert_with(|| Bytes::from_static(&[0x60]));
            s.call_nonces.insert(deployer, nonce)
        });
    }

    /// Make every following submission fail.
    pub fn fail_sends(&self) {
        self.with_state(|s| s.fail_sends = true);
    }

    /// Report pending for the next `polls` receipt requests of every unmined transaction.
    pub fn delay_receipts(&self, polls: usize) {
        self.with_state(|s| {
            s.receipt_delay = polls;
            for (hash, remaining) in s.pending.iter_mut() {
                if !s.mined.contains(hash) {
                    *remaining = polls;
                }
            }
        });
    }

    pub fn revert(&self, hash: B256) {
        self.with_state(|s| s.reverted.insert(hash));
    }

    pub fn receipt_polls(&self) -> usize {
        self.with_state(|s| s.receipt_polls)
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.with_state(|s| s.events.clone())
    }

    pub fn sent_raw(&self) -> Vec<Bytes> {
        self.with_state(|s| s.sent.clone())
    }

    /// Decode every submitted transaction as EIP-1559.
    pub fn sent_transactions(&self) -> Vec<TxEip1559> {
        self.sent_raw()
            .iter()
            .map(|raw| {
                let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap();
                envelope.as_eip1559().unwrap().tx().clone()
            })
            .collect()
    }

    /// Answer an `eth_call`. Like a node, a call to an address without code returns nothing.
    fn answer_call(&self, to: Address, data: &[u8]) -> anyhow::Result<Bytes> {
        if self.with_state(|s| s.code.get(&to).is_none_or(|code| code.is_empty())) {
            return Ok(Bytes::new());
        }

        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| anyhow::anyhow!("call data too short"))?;

        if selector == IDeploymentManager::getDeployerCall::SELECTOR {
            let call = IDeploymentManager::getDeployerCall::abi_decode(data)?;
            let deployer = self.with_state(|s| {
                s.deployers
                    .get(&(call.account, call.accountSalt))
                    .copied()
                    .unwrap_or_default()
            });
            return Ok(deployer.abi_encode().into());
        }

        if selector == IDeploymentAccount::callNonceCall::SELECTOR {
            let nonce = self.with_state(|s| s.call_nonces.get(&to).copied());
            return Ok(match nonce {
                Some(nonce) => U256::from(nonce).abi_encode().into(),
                None => Bytes::new(),
            });
        }

        anyhow::bail!("unsupported call to {}", to)
    }
}

impl ChainClient for MockChain {
    async fn chain_id(&self) -> anyhow::Result<u64> {
        Ok(self.with_state(|s| s.chain_id))
    }

    async fn balance(&self, address: Address) -> anyhow::Result<U256> {
        Ok(self.with_state(|s| s.balances.get(&address).copied().unwrap_or_default()))
    }

    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        Ok(self.with_state(|s| s.nonces.get(&address).copied().unwrap_or_default()))
    }

    async fn code(&self, address: Address) -> anyhow::Result<Bytes> {
        Ok(self.with_state(|s| s.code.get(&address).cloned().unwrap_or_default()))
    }

    async fn call(&self, to: Address, data: Bytes) -> anyhow::Result<Bytes> {
        self.answer_call(to, &data)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<B256> {
        self.with_state(|s| {
            if s.fail_sends {
                anyhow::bail!("nonce too low");
            }
            let hash = keccak256(&raw);
            s.sent.push(raw);
            s.events.push(ChainEvent::Sent(hash));
            s.pending.insert(hash, s.receipt_delay);
            Ok(hash)
        })
    }

    async fn transaction_receipt(&self, hash: B256) -> anyhow::Result<Option<TransactionReceipt>> {
        self.with_state(|s| {
            s.receipt_polls += 1;
            let Some(remaining) = s.pending.get_mut(&hash) else {
                return Ok(None);
            };
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(None);
            }

            if s.mined.insert(hash) {
                s.events.push(ChainEvent::Receipt(hash));
            }
            let status = if s.reverted.contains(&hash) { 0 } else { 1 };
            Ok(Some(TransactionReceipt {
                transaction_hash: hash,
                block_number: Some(U64::from(1)),
                status: Some(U64::from(status)),
                gas_used: Some(U256::from(21000)),
                contract_address: None,
            }))
        })
    }
}
