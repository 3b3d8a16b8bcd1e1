//! Step hashes and owner signatures for managed projects.
//!
//! The hash is the pre-image the deployment manager recomputes on-chain, so the packed
//! field order below is a wire format:
//!
//! ```text
//! call:    manager ‖ ":call:"    ‖ owner ‖ ownerSalt ‖ callNonce ‖ addr ‖ amount ‖ data
//! create:  manager ‖ ":create:"  ‖ owner ‖ ownerSalt ‖ callNonce ‖ code
//! create2: manager ‖ ":create2:" ‖ owner ‖ ownerSalt ‖ callNonce ‖ salt ‖ code
//! ```
//!
//! Addresses are 20 bytes, `uint256` values 32 bytes and the call nonce a 16 byte
//! `uint128`, all big-endian.

use alloy_core::primitives::{Address, B256, Bytes, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use chrono::Utc;

use crate::{
    chain::ChainClient,
    executor::{ResolvedStep, resolve_step},
    manager::step_call_nonce,
    project::{Project, ProjectAccount, ProjectMode},
    resolver::Resolver,
    signatures::SignaturesFile,
};

/// Compute the hash the owner signs for one managed step.
pub fn step_hash(
    manager: Address,
    account: &ProjectAccount,
    call_nonce: u128,
    step: &ResolvedStep,
) -> B256 {
    let tag: &[u8] = match step {
        ResolvedStep::Create { .. } => b":create:",
        ResolvedStep::Create2 { .. } => b":create2:",
        ResolvedStep::Call { .. } => b":call:",
    };

    let mut packed = Vec::with_capacity(256);
    packed.extend_from_slice(manager.as_slice());
    packed.extend_from_slice(tag);
    packed.extend_from_slice(account.address.as_slice());
    packed.extend_from_slice(&account.salt.to_be_bytes::<32>());
    packed.extend_from_slice(&call_nonce.to_be_bytes());

    match step {
        ResolvedStep::Create { code } => packed.extend_from_slice(code),
        ResolvedStep::Create2 { salt, code } => {
            packed.extend_from_slice(&salt.to_be_bytes::<32>());
            packed.extend_from_slice(code);
        }
        ResolvedStep::Call { to, amount, data } => {
            packed.extend_from_slice(to.as_slice());
            packed.extend_from_slice(&amount.to_be_bytes::<32>());
            packed.extend_from_slice(data);
        }
    }

    keccak256(&packed)
}

/// Signs step hashes with an owner key.
#[derive(Debug, Clone)]
pub struct MessageSigner {
    signer: PrivateKeySigner,
}

impl MessageSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign `hash` as an Ethereum personal message.
    ///
    /// The result is `r ‖ s ‖ v` with `v` in `{27, 28}`.
    pub fn sign_step_hash(&self, hash: B256) -> anyhow::Result<Bytes> {
        let signature = self
            .signer
            .sign_message_sync(hash.as_slice())
            .context("Failed to sign step hash")?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

/// Sign every step of a managed project, in order.
///
/// The signer must be the project owner. Any step that cannot be hashed aborts signing.
pub async fn generate_signatures<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    signer: &MessageSigner,
) -> anyhow::Result<Vec<Bytes>> {
    if project.mode() != ProjectMode::Managed {
        anyhow::bail!("Project `{}` is not managed, no signatures required", project.name());
    }

    let account = project.account()?;
    if signer.address() != account.address {
        anyhow::bail!(
            "Cannot sign `{}`: project is owned by {}, but the supplied key is for {}",
            project.name(),
            account.address,
            signer.address()
        );
    }

    if project.steps().is_empty() {
        return Ok(Vec::new());
    }

    let manager = resolver.manager_address().await?;
    let mut signatures = Vec::with_capacity(project.steps().len());

    for (index, step) in project.steps().iter().enumerate() {
        let resolved = resolve_step(resolver, project, &step.action)
            .await
            .with_context(|| {
                format!("Failed to resolve step {} of `{}`", index + 1, project.name())
            })?
            .with_context(|| {
                format!(
                    "Deployment action `{}` in step {} cannot be signed",
                    step.action.name(),
                    index + 1
                )
            })?;

        let hash = step_hash(manager, account, step_call_nonce(index), &resolved);
        tracing::debug!(step = index + 1, action = step.action.name(), %hash, "Signing step");
        signatures.push(signer.sign_step_hash(hash)?);
    }

    Ok(signatures)
}

/// Result of signing a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutcome {
    pub signatures: usize,
    /// Whether `signatures.yaml` was rewritten.
    pub updated: bool,
}

/// Sign `project` and store the signatures for the current manager.
///
/// The file is only rewritten when the signatures differ from the stored ones, so
/// re-signing an unchanged project keeps the original signing time.
pub async fn sign_project<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    signer: &MessageSigner,
) -> anyhow::Result<SignOutcome> {
    let signatures = generate_signatures(resolver, project, signer).await?;
    let count = signatures.len();
    let manager = resolver.manager_address().await?;

    let path = project.signatures_path();
    let mut file = SignaturesFile::load_from_file(&path)?;
    let updated = file.update(manager, signatures, Utc::now().timestamp());

    if updated {
        file.save_to_file(&path)?;
        tracing::info!(
            project = %project.name(),
            signatures = count,
            path = %path.display(),
            "Signatures saved"
        );
    } else {
        tracing::info!(project = %project.name(), "Signatures unchanged");
    }

    Ok(SignOutcome {
        signatures: count,
        updated,
    })
}
