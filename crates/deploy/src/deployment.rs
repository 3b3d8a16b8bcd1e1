//! The project deployment state machine.
//!
//! Managed projects resume at the deployer's on-chain call nonce, so confirmed steps are
//! never replayed. Every remaining step is resolved before the first transaction is
//! submitted, except conditional standalone steps, which resolve once their conditions
//! hold. Steps are then fired back to back; a step with `await: true` blocks until
//! all receipts collected so far are in.

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use futures::future::try_join_all;

use crate::{
    chain::{ChainClient, PendingTransaction, TransactionReceipt},
    conditions::check_conditions,
    executor::{StepTransaction, prepare_managed_step, prepare_standalone_step},
    manager,
    project::{Project, ProjectMode, Step},
    resolver::Resolver,
    signatures::SignaturesFile,
    status::{check_dependencies, check_deployment_status},
    txbuilder::TransactionBuilder,
};

/// A step that was accepted by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedStep {
    pub index: usize,
    pub action: String,
    pub tx_hash: B256,
}

/// Result of one run of the state machine.
#[derive(Debug, Clone, Default)]
pub struct DeploymentReport {
    /// Index of the first step considered in this run.
    pub start: usize,
    pub submitted: Vec<SubmittedStep>,
    /// Steps skipped because of an unknown action or unmet conditions.
    pub skipped: Vec<usize>,
    pub receipts: Vec<TransactionReceipt>,
}

/// Outcome of the `deploy` flow.
#[derive(Debug)]
pub enum DeployOutcome {
    AlreadyDeployed,
    MissingDependencies(Vec<String>),
    Deployed(DeploymentReport),
}

/// Deploy `project` unless it is complete or a dependency is missing.
pub async fn deploy<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    builder: &mut TransactionBuilder<C>,
) -> anyhow::Result<DeployOutcome> {
    match check_deployment_status(resolver, project).await {
        Ok(true) => {
            tracing::info!(project = %project.name(), "Project is already deployed");
            return Ok(DeployOutcome::AlreadyDeployed);
        }
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(
                project = %project.name(),
                error = %format!("{:#}", err),
                "Deployment status check failed, treating project as not deployed"
            );
        }
    }

    let dependencies = check_dependencies(resolver, project).await;
    if !dependencies.is_satisfied() {
        tracing::info!(
            project = %project.name(),
            missing = %dependencies.missing.join(", "),
            "Missing dependencies"
        );
        return Ok(DeployOutcome::MissingDependencies(dependencies.missing));
    }

    tracing::info!(project = %project.name(), mode = %project.mode(), "Deploying project...");
    let report = deploy_project(resolver, project, builder).await?;
    tracing::info!(
        project = %project.name(),
        submitted = report.submitted.len(),
        skipped = report.skipped.len(),
        "Deployment finished"
    );

    Ok(DeployOutcome::Deployed(report))
}

/// A step with its transaction resolved ahead of submission.
///
/// Conditional standalone steps are deferred: they are resolved only once their
/// conditions hold, so a step that is skipped never has to resolve.
struct PlannedStep<'p> {
    index: usize,
    step: &'p Step,
    transaction: Option<StepTransaction>,
    deferred: bool,
}

/// Run the state machine for `project`.
pub async fn deploy_project<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    builder: &mut TransactionBuilder<C>,
) -> anyhow::Result<DeploymentReport> {
    let (start, plan) = match project.mode() {
        ProjectMode::Managed => plan_managed(resolver, project, builder.address()).await?,
        ProjectMode::Standalone => (0, plan_standalone(resolver, project).await?),
    };

    let mut report = DeploymentReport {
        start,
        ..Default::default()
    };
    let mut outstanding: Vec<PendingTransaction<C>> = Vec::new();

    for planned in plan {
        let PlannedStep {
            index,
            step,
            transaction,
            deferred,
        } = planned;
        let action = step.action.name();

        let transaction = if deferred {
            if !check_conditions(resolver, project, &step.conditions).await {
                tracing::warn!(
                    project = %project.name(),
                    step = index + 1,
                    "Skipping step: conditions not met"
                );
                report.skipped.push(index);
                continue;
            }
            prepare_standalone_step(resolver, project, index, step).await?
        } else {
            transaction
        };

        let Some(transaction) = transaction else {
            tracing::error!(
                project = %project.name(),
                step = index + 1,
                action,
                mode = %project.mode(),
                "Unknown deployment action, skipping step"
            );
            report.skipped.push(index);
            continue;
        };

        let pending = transaction.submit(builder).await.with_context(|| {
            format!("Failed to submit step {} of `{}`", index + 1, project.name())
        })?;
        tracing::info!(
            project = %project.name(),
            step = index + 1,
            action,
            tx_hash = %pending.hash(),
            "Deploying step"
        );

        report.submitted.push(SubmittedStep {
            index,
            action: action.to_string(),
            tx_hash: pending.hash(),
        });
        outstanding.push(pending);

        if step.wait {
            tracing::debug!(step = index + 1, pending = outstanding.len(), "Awaiting receipts");
            report.receipts.extend(await_receipts(&mut outstanding).await?);
        }
    }

    report.receipts.extend(await_receipts(&mut outstanding).await?);
    Ok(report)
}

async fn await_receipts<C: ChainClient>(
    outstanding: &mut Vec<PendingTransaction<C>>,
) -> anyhow::Result<Vec<TransactionReceipt>> {
    try_join_all(outstanding.drain(..).map(PendingTransaction::confirmed)).await
}

async fn plan_managed<'p, C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &'p Project,
    wallet: Address,
) -> anyhow::Result<(usize, Vec<PlannedStep<'p>>)> {
    let steps = project.steps();
    let account = project.account()?;
    let manager_address = resolver.manager_address().await?;
    let deployer = resolver.deployer_address(project).await?;

    let start = manager::call_nonce(resolver.client(), deployer).await? as usize;
    if start > 0 {
        tracing::info!(project = %project.name(), step = start + 1, "Resuming deployment");
    }
    if start >= steps.len() {
        return Ok((start, Vec::new()));
    }

    let signatures = if wallet == account.address {
        Vec::new()
    } else {
        load_signatures(project, manager_address)?
    };

    let mut plan = Vec::with_capacity(steps.len() - start);
    for (index, step) in steps.iter().enumerate().skip(start) {
        let transaction = prepare_managed_step(
            resolver,
            project,
            manager_address,
            wallet,
            index,
            step,
            &signatures,
        )
        .await?;
        plan.push(PlannedStep {
            index,
            step,
            transaction,
            deferred: false,
        });
    }

    Ok((start, plan))
}

/// Load the stored signatures of `project` for `manager`.
///
/// A relayer can only submit if there is one signature per step.
fn load_signatures(project: &Project, manager: Address) -> anyhow::Result<Vec<Bytes>> {
    let path = project.signatures_path();
    let file = SignaturesFile::load_from_file(&path)?;
    let set = file.get(manager).with_context(|| {
        format!(
            "No deployment signatures for `{}` and manager {} in {}",
            project.name(),
            manager,
            path.display()
        )
    })?;

    if set.signatures.len() != project.steps().len() {
        anyhow::bail!(
            "Project `{}` has {} steps but {} signatures, re-sign the project",
            project.name(),
            project.steps().len(),
            set.signatures.len()
        );
    }

    tracing::info!(
        project = %project.name(),
        signed = %set.render_signtime(),
        "Loaded deployment signatures"
    );
    Ok(set.signatures.clone())
}

async fn plan_standalone<'p, C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &'p Project,
) -> anyhow::Result<Vec<PlannedStep<'p>>> {
    let mut plan = Vec::with_capacity(project.steps().len());
    for (index, step) in project.steps().iter().enumerate() {
        let deferred = !step.conditions.is_empty();
        let transaction = if deferred {
            None
        } else {
            prepare_standalone_step(resolver, project, index, step).await?
        };
        plan.push(PlannedStep {
            index,
            step,
            transaction,
            deferred,
        });
    }
    Ok(plan)
}
