//! Bindings for the on-chain deployment manager and its per-owner deployer accounts.

use alloy_core::{
    primitives::{Address, Bytes},
    sol,
    sol_types::SolCall,
};
use anyhow::Context;

use crate::{chain::ChainClient, executor::ResolvedStep, project::ProjectAccount};

sol! {
    /// Singleton that executes pre-authorized deployment steps for project owners.
    interface IDeploymentManager {
        function getDeployer(address account, uint256 accountSalt) external view returns (address deployer);
        function getCreateAddress(address account, uint256 accountSalt, uint256 nonce) external view returns (address addr);

        function create(address account, uint256 accountSalt, bytes bytecode) external returns (address addr);
        function createFor(address account, uint256 accountSalt, bytes bytecode, uint128 callNonce, bytes signature) external returns (address addr);
        function create2(uint256 accountSalt, uint256 salt, bytes bytecode) external returns (address addr);
        function create2For(address account, uint256 accountSalt, uint256 salt, bytes bytecode, uint128 callNonce, bytes signature) external returns (address addr);
        function call(address account, uint256 accountSalt, address addr, uint256 amount, bytes data) external payable returns (bytes result);
        function callFor(address account, uint256 accountSalt, address addr, uint256 amount, bytes data, uint128 callNonce, bytes signature) external payable returns (bytes result);
    }

    /// Per-owner sub-account created by the manager; tracks how many steps were executed.
    interface IDeploymentAccount {
        function callNonce() external view returns (uint128 nonce);
    }
}

/// Authorization attached to a managed step submitted on behalf of the owner.
#[derive(Debug, Clone)]
pub struct StepAuthorization {
    pub call_nonce: u128,
    pub signature: Bytes,
}

/// Encode the manager call for a resolved step.
///
/// Without an authorization the unsigned entry point is used, which only succeeds when
/// the transaction is sent by the project owner. With one, the `...For` variant carries
/// the call nonce and the owner's signature.
pub fn encode_step_call(
    account: &ProjectAccount,
    step: &ResolvedStep,
    authorization: Option<&StepAuthorization>,
) -> Bytes {
    let encoded = match (step, authorization) {
        (ResolvedStep::Create { code }, None) => IDeploymentManager::createCall {
            account: account.address,
            accountSalt: account.salt,
            bytecode: code.clone(),
        }
        .abi_encode(),
        (ResolvedStep::Create { code }, Some(auth)) => IDeploymentManager::createForCall {
            account: account.address,
            accountSalt: account.salt,
            bytecode: code.clone(),
            callNonce: auth.call_nonce,
            signature: auth.signature.clone(),
        }
        .abi_encode(),
        (ResolvedStep::Create2 { salt, code }, None) => IDeploymentManager::create2Call {
            accountSalt: account.salt,
            salt: *salt,
            bytecode: code.clone(),
        }
        .abi_encode(),
        (ResolvedStep::Create2 { salt, code }, Some(auth)) => IDeploymentManager::create2ForCall {
            account: account.address,
            accountSalt: account.salt,
            salt: *salt,
            bytecode: code.clone(),
            callNonce: auth.call_nonce,
            signature: auth.signature.clone(),
        }
        .abi_encode(),
        (ResolvedStep::Call { to, amount, data }, None) => IDeploymentManager::callCall {
            account: account.address,
            accountSalt: account.salt,
            addr: *to,
            amount: *amount,
            data: data.clone(),
        }
        .abi_encode(),
        (ResolvedStep::Call { to, amount, data }, Some(auth)) => IDeploymentManager::callForCall {
            account: account.address,
            accountSalt: account.salt,
            addr: *to,
            amount: *amount,
            data: data.clone(),
            callNonce: auth.call_nonce,
            signature: auth.signature.clone(),
        }
        .abi_encode(),
    };

    encoded.into()
}

/// Ask the manager for the deployer account of `account`.
pub async fn deployer_address<C: ChainClient>(
    client: &C,
    manager: Address,
    account: &ProjectAccount,
) -> anyhow::Result<Address> {
    let call = IDeploymentManager::getDeployerCall {
        account: account.address,
        accountSalt: account.salt,
    };
    let output = client
        .call(manager, call.abi_encode().into())
        .await
        .with_context(|| format!("Failed to query deployer of {}", account.address))?;

    if output.is_empty() {
        anyhow::bail!("No deployment manager code at {}", manager);
    }

    IDeploymentManager::getDeployerCall::abi_decode_returns(&output)
        .context("Failed to decode getDeployer result")
}

/// Read the number of executed steps from a deployer account.
///
/// An account that does not exist yet has executed nothing.
pub async fn call_nonce<C: ChainClient>(client: &C, deployer: Address) -> anyhow::Result<u64> {
    if deployer == Address::ZERO {
        return Ok(0);
    }

    let output = client
        .call(deployer, IDeploymentAccount::callNonceCall {}.abi_encode().into())
        .await
        .with_context(|| format!("Failed to query call nonce of {}", deployer))?;

    if output.is_empty() {
        return Ok(0);
    }

    let nonce: u128 = IDeploymentAccount::callNonceCall::abi_decode_returns(&output)
        .context("Failed to decode callNonce result")?;

    u64::try_from(nonce).context("Call nonce out of range")
}

/// Convert a step index into the call nonce that authorizes it.
pub fn step_call_nonce(index: usize) -> u128 {
    index as u128
}
