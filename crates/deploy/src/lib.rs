//! cascade-deploy - Deployment orchestration for smart contract projects.
//!
//! A project is a directory with a `deployment.yaml` describing an ordered list of
//! deployment steps. Managed projects are executed through an on-chain deployment manager
//! that tracks progress per owner account, so an interrupted deployment resumes where it
//! stopped and steps can be pre-signed by the owner and relayed by any wallet.

pub mod abi;
pub mod address;
pub mod chain;
pub mod conditions;
pub mod deployment;
pub mod executor;
pub mod manager;
pub mod project;
pub mod resolver;
pub mod rpc;
pub mod signatures;
pub mod signing;
pub mod status;
pub mod txbuilder;
pub mod units;
pub mod verify;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use chain::{ChainClient, PendingTransaction, TransactionReceipt};
pub use deployment::{DeployOutcome, DeploymentReport, deploy, deploy_project};
pub use project::{Project, ProjectLoader, ProjectMode};
pub use resolver::Resolver;
pub use rpc::RpcClient;
pub use signatures::SignaturesFile;
pub use signing::{MessageSigner, SignOutcome, generate_signatures, sign_project};
pub use status::{
    DependencyCheck, DeploymentState, DeploymentStatus, check_dependencies, dependency_names,
    deployment_status,
};
pub use txbuilder::{FeeConfig, TransactionBuilder};
pub use verify::{ExplorersConfig, verify_project_codes};
pub use wallet::parse_private_key;

pub use alloy_signer_local::PrivateKeySigner;
