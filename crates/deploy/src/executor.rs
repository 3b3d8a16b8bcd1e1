//! Per-action step executors.
//!
//! A step is first resolved into concrete on-chain data, then turned into exactly one
//! [`StepTransaction`] which the [`TransactionBuilder`] submits.

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::Context;

use crate::{
    abi,
    chain::{ChainClient, PendingTransaction},
    manager::{self, StepAuthorization},
    project::{
        AbiCall, CallStep, Create2Step, CreateStep, Project, Step, StepAction, parse_u256,
    },
    resolver::Resolver,
    txbuilder::TransactionBuilder,
};

/// On-chain data of a managed step after all references were resolved.
///
/// This is what the step hash commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedStep {
    Create { code: Bytes },
    Create2 { salt: U256, code: Bytes },
    Call { to: Address, amount: U256, data: Bytes },
}

impl ResolvedStep {
    /// Value attached to the manager transaction.
    pub fn value(&self) -> U256 {
        match self {
            ResolvedStep::Call { amount, .. } => *amount,
            _ => U256::ZERO,
        }
    }
}

/// The single transaction a step emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTransaction {
    /// Built, signed and nonce-tracked by the deployer wallet.
    Build {
        to: Address,
        value: U256,
        input: Bytes,
        gas_limit: Option<u64>,
    },
    /// A pre-signed transaction published verbatim.
    Raw(Bytes),
}

impl StepTransaction {
    /// Submit the transaction, returning once the node accepted it.
    pub async fn submit<C: ChainClient>(
        self,
        builder: &mut TransactionBuilder<C>,
    ) -> anyhow::Result<PendingTransaction<C>> {
        match self {
            StepTransaction::Build {
                to,
                value,
                input,
                gas_limit,
            } => builder.send(to, value, input, gas_limit).await,
            StepTransaction::Raw(raw) => builder.publish_raw(raw).await,
        }
    }
}

/// Resolve the hashed data of a `create`, `create2` or `call` step.
///
/// Returns `None` for actions that have no managed form.
pub async fn resolve_step<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    action: &StepAction,
) -> anyhow::Result<Option<ResolvedStep>> {
    let resolved = match action {
        StepAction::Create(create) => ResolvedStep::Create {
            code: resolve_create_code(resolver, project, create).await?,
        },
        StepAction::Create2(create2) => resolve_create2(resolver, project, create2).await?,
        StepAction::Call(call) => {
            let (to, amount, data) = resolve_call(resolver, project, call).await?;
            ResolvedStep::Call { to, amount, data }
        }
        StepAction::Publish(_) | StepAction::Unknown(_) => return Ok(None),
    };
    Ok(Some(resolved))
}

async fn resolve_create_code<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    create: &CreateStep,
) -> anyhow::Result<Bytes> {
    init_code(resolver, project, &create.bytecode, create.constructor.as_ref()).await
}

async fn resolve_create2<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    create2: &Create2Step,
) -> anyhow::Result<ResolvedStep> {
    let salt = parse_u256(&resolver.resolve_value(project, &create2.salt).await?)
        .context("Invalid create2 salt")?;
    let code = init_code(resolver, project, &create2.bytecode, create2.constructor.as_ref()).await?;
    Ok(ResolvedStep::Create2 { salt, code })
}

async fn init_code<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    bytecode: &str,
    constructor: Option<&AbiCall>,
) -> anyhow::Result<Bytes> {
    let mut code = resolve_hex(resolver, project, bytecode)
        .await
        .context("Invalid bytecode")?
        .to_vec();

    if let Some(constructor) = constructor {
        let args = abi::encode_constructor(resolver, project, constructor).await?;
        code.extend_from_slice(&args);
    }

    Ok(code.into())
}

async fn resolve_call<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    call: &CallStep,
) -> anyhow::Result<(Address, U256, Bytes)> {
    let to = resolver.resolve_address(project, &call.address).await?;
    let amount = parse_u256(&resolver.resolve_value(project, &call.amount).await?)
        .context("Invalid call amount")?;

    let data = match (&call.data, &call.call) {
        (Some(data), _) => resolve_hex(resolver, project, data).await.context("Invalid call data")?,
        (None, Some(abi_call)) => abi::encode_call(resolver, project, abi_call).await?,
        (None, None) => Bytes::new(),
    };

    Ok((to, amount, data))
}

/// Expand placeholders in a hex blob and decode it.
async fn resolve_hex<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    input: &str,
) -> anyhow::Result<Bytes> {
    let input = input.trim();
    let input = input.strip_prefix("0x").unwrap_or(input);
    let expanded = resolver.resolve_placeholders(project, input).await?;
    let bytes = hex::decode(&expanded).with_context(|| format!("`{}` is not valid hex", expanded))?;
    Ok(bytes.into())
}

/// Prepare a step of a managed project.
///
/// The owner wallet uses the unsigned manager entry points. Any other wallet submits on
/// the owner's behalf and needs the stored signature for the step.
pub async fn prepare_managed_step<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    manager: Address,
    wallet: Address,
    index: usize,
    step: &Step,
    signatures: &[Bytes],
) -> anyhow::Result<Option<StepTransaction>> {
    let Some(resolved) = resolve_step(resolver, project, &step.action)
        .await
        .with_context(|| format!("Failed to resolve step {} of `{}`", index + 1, project.name()))?
    else {
        return Ok(None);
    };

    let account = project.account()?;
    let authorization = if wallet == account.address {
        None
    } else {
        let signature = signatures.get(index).with_context(|| {
            format!("Missing signature for step {} of `{}`", index + 1, project.name())
        })?;
        Some(StepAuthorization {
            call_nonce: manager::step_call_nonce(index),
            signature: signature.clone(),
        })
    };

    Ok(Some(StepTransaction::Build {
        to: manager,
        value: resolved.value(),
        input: manager::encode_step_call(account, &resolved, authorization.as_ref()),
        gas_limit: step.gas.or(project.gas()),
    }))
}

/// Prepare a step of a standalone project.
///
/// Only `call` and `publish` apply; other actions yield `None`.
pub async fn prepare_standalone_step<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    index: usize,
    step: &Step,
) -> anyhow::Result<Option<StepTransaction>> {
    let prepared = match &step.action {
        StepAction::Call(call) => {
            let (to, value, input) = resolve_call(resolver, project, call)
                .await
                .with_context(|| {
                    format!("Failed to resolve step {} of `{}`", index + 1, project.name())
                })?;
            StepTransaction::Build {
                to,
                value,
                input,
                gas_limit: step.gas.or(project.gas()),
            }
        }
        StepAction::Publish(publish) => {
            let raw = publish.transaction.trim();
            let raw = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
                .with_context(|| format!("Invalid raw transaction in step {}", index + 1))?;
            StepTransaction::Raw(raw.into())
        }
        _ => return Ok(None),
    };
    Ok(Some(prepared))
}
