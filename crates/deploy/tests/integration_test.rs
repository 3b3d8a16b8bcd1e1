//! Integration tests for cascade-deploy.
//!
//! The signing tests run offline against project files in a temporary directory.
//! The live test needs a development node (e.g. anvil) and only runs when
//! `CASCADE_TEST_RPC_URL` is set:
//!
//! CASCADE_TEST_RPC_URL=http://127.0.0.1:8545 cargo test --test integration_test

use std::{path::Path, str::FromStr, time::Duration};

use alloy_core::primitives::{Address, B256, Bytes, Signature, U256, eip191_hash_message};
use anyhow::Result;
use cascade_deploy::{
    ChainClient, FeeConfig, MessageSigner, ProjectLoader, Resolver, RpcClient, SignaturesFile,
    TransactionBuilder, TransactionReceipt, deploy_project,
    executor::resolve_step,
    manager::step_call_nonce,
    parse_private_key, sign_project,
    signing::step_hash,
};
use tempdir::TempDir;

/// Anvil development key of `0x70997970C51812dc3A010C7d01b50e0d17dc79C8`.
const OWNER_KEY: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
/// Anvil development key of `0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266`.
const FUNDED_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const MANAGER: &str = "0x4e59b44847b379578588920cA78FbF26c0B4956C";

/// A chain client for flows that must not touch the network.
#[derive(Debug, Clone)]
struct OfflineChain;

impl ChainClient for OfflineChain {
    async fn chain_id(&self) -> Result<u64> {
        anyhow::bail!("offline")
    }

    async fn balance(&self, _address: Address) -> Result<U256> {
        anyhow::bail!("offline")
    }

    async fn transaction_count(&self, _address: Address) -> Result<u64> {
        anyhow::bail!("offline")
    }

    async fn code(&self, _address: Address) -> Result<Bytes> {
        anyhow::bail!("offline")
    }

    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes> {
        anyhow::bail!("offline")
    }

    async fn send_raw_transaction(&self, _raw: Bytes) -> Result<B256> {
        anyhow::bail!("offline")
    }

    async fn transaction_receipt(&self, _hash: B256) -> Result<Option<TransactionReceipt>> {
        anyhow::bail!("offline")
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn write_project(root: &Path, name: &str, yaml: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("deployment.yaml"), yaml).unwrap();
}

fn signing_fixture() -> TempDir {
    let dir = TempDir::new("cascade-integration").unwrap();
    write_project(
        dir.path(),
        "_manager",
        &format!("mode: standalone\nexports:\n  DeploymentManager: contract:{}\n", MANAGER),
    );
    write_project(
        dir.path(),
        "token",
        r#"mode: managed
account:
  address: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
  salt: 42
steps:
  - action: create2
    salt: 1
    bytecode: "0x6080604052"
    constructor:
      abi: "constructor(string name, uint8 decimals)"
      args: ["Cascade", 18]
  - action: call
    address: "contract:0x1111111111111111111111111111111111111111"
    amount: "ether:0.25"
    call:
      abi: "function transfer(address to, uint256 amount)"
      args: ["0x2222222222222222222222222222222222222222", 1000]
"#,
    );
    dir
}

#[tokio::test]
async fn test_sign_flow_writes_recoverable_signatures() {
    init_tracing();
    let dir = signing_fixture();
    let loader = ProjectLoader::new(dir.path());
    let chain = OfflineChain;
    let resolver = Resolver::new(&loader, &chain);
    let project = loader.load("token").unwrap();
    let signer = MessageSigner::new(parse_private_key(OWNER_KEY).unwrap());

    let outcome = sign_project(&resolver, &project, &signer).await.unwrap();
    assert_eq!(outcome.signatures, 2);
    assert!(outcome.updated);

    let manager = Address::from_str(MANAGER).unwrap();
    let file = SignaturesFile::load_from_file(&project.signatures_path()).unwrap();
    let set = file.get(manager).unwrap();
    assert_eq!(set.signatures.len(), 2);

    let account = project.account().unwrap();
    for (index, step) in project.steps().iter().enumerate() {
        let resolved = resolve_step(&resolver, &project, &step.action).await.unwrap().unwrap();
        let hash = step_hash(manager, account, step_call_nonce(index), &resolved);

        let signature = Signature::try_from(set.signatures[index].as_ref()).unwrap();
        let recovered = signature
            .recover_address_from_prehash(&eip191_hash_message(hash))
            .unwrap();
        assert_eq!(recovered, account.address);
    }

    let again = sign_project(&resolver, &project, &signer).await.unwrap();
    assert!(!again.updated);
}

#[tokio::test]
async fn test_sign_flow_rejects_foreign_key() {
    let dir = signing_fixture();
    let loader = ProjectLoader::new(dir.path());
    let chain = OfflineChain;
    let resolver = Resolver::new(&loader, &chain);
    let project = loader.load("token").unwrap();
    let signer = MessageSigner::new(parse_private_key(FUNDED_KEY).unwrap());

    assert!(sign_project(&resolver, &project, &signer).await.is_err());
    assert!(!project.signatures_path().exists());
}

#[tokio::test]
async fn test_live_standalone_transfer() {
    let Ok(rpc_url) = std::env::var("CASCADE_TEST_RPC_URL") else {
        return;
    };
    init_tracing();

    let dir = TempDir::new("cascade-live").unwrap();
    write_project(
        dir.path(),
        "payout",
        r#"mode: standalone
steps:
  - action: call
    address: "contract:0x3333333333333333333333333333333333333333"
    amount: "ether:0.001"
    gas: 21000
    await: true
  - action: call
    address: "contract:0x3333333333333333333333333333333333333333"
    amount: 1
    gas: 21000
"#,
    );

    let client = RpcClient::new(rpc_url.parse().unwrap()).unwrap();
    let recipient = Address::repeat_byte(0x33);
    let before = client.balance(recipient).await.unwrap();

    let loader = ProjectLoader::new(dir.path());
    let resolver = Resolver::new(&loader, &client);
    let project = loader.load("payout").unwrap();
    let signer = parse_private_key(FUNDED_KEY).unwrap();
    let mut builder = TransactionBuilder::new(client.clone(), signer, FeeConfig::default())
        .await
        .unwrap()
        .with_poll_interval(Duration::from_millis(200));
    let start_nonce = builder.wallet().nonce;

    let report = deploy_project(&resolver, &project, &mut builder).await.unwrap();
    assert_eq!(report.submitted.len(), 2);
    assert_eq!(report.receipts.len(), 2);
    assert_eq!(builder.wallet().nonce, start_nonce + 2);

    let after = client.balance(recipient).await.unwrap();
    assert_eq!(after - before, U256::from(1_000_000_000_000_001u128));
}
