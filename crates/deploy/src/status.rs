//! Deployment status and dependency checks.
//!
//! A managed project is complete once its deployer's call nonce reached the step count.
//! A standalone project is complete once every `contract:` export has code.

use std::str::FromStr;

use alloy_core::primitives::Address;
use anyhow::Context;
use futures::future::{join_all, try_join_all};
use strum::Display;

use crate::{
    chain::ChainClient,
    manager,
    project::{MANAGER_PROJECT, Project, ProjectMode},
    resolver::Resolver,
};

/// Observed progress of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub project: String,
    pub mode: ProjectMode,
    pub steps: usize,
    /// Executed steps (managed) or deployed contract exports (standalone).
    pub progress: u64,
    /// Value of `progress` at which the project is complete.
    pub target: u64,
}

/// Lifecycle of a project deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum DeploymentState {
    Pending,
    InProgress,
    Complete,
}

impl DeploymentStatus {
    pub fn is_complete(&self) -> bool {
        self.progress >= self.target
    }

    pub fn state(&self) -> DeploymentState {
        if self.is_complete() {
            DeploymentState::Complete
        } else if self.progress == 0 {
            DeploymentState::Pending
        } else {
            DeploymentState::InProgress
        }
    }
}

/// Query the chain for the progress of `project`.
pub async fn deployment_status<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
) -> anyhow::Result<DeploymentStatus> {
    let (progress, target) = match project.mode() {
        ProjectMode::Managed => {
            let deployer = resolver.deployer_address(project).await?;
            let nonce = manager::call_nonce(resolver.client(), deployer).await?;
            (nonce, project.steps().len() as u64)
        }
        ProjectMode::Standalone => {
            let contracts = contract_exports(project)?;
            let codes = try_join_all(
                contracts
                    .iter()
                    .map(|address| resolver.client().code(*address)),
            )
            .await?;
            let deployed = codes.iter().filter(|code| !code.is_empty()).count();
            (deployed as u64, contracts.len() as u64)
        }
    };

    Ok(DeploymentStatus {
        project: project.name().to_string(),
        mode: project.mode(),
        steps: project.steps().len(),
        progress,
        target,
    })
}

/// Addresses of the `contract:` exports of a project.
fn contract_exports(project: &Project) -> anyhow::Result<Vec<Address>> {
    project
        .exports()
        .iter()
        .filter_map(|(name, reference)| {
            reference
                .strip_prefix("contract:")
                .map(|address| (name, address))
        })
        .map(|(name, address)| {
            Address::from_str(address.trim()).with_context(|| {
                format!("Export `{}` of `{}` is not an address", name, project.name())
            })
        })
        .collect()
}

/// Whether `project` is fully deployed.
pub async fn check_deployment_status<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
) -> anyhow::Result<bool> {
    Ok(deployment_status(resolver, project).await?.is_complete())
}

/// Outcome of a dependency check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyCheck {
    /// Dependencies that are not deployed or could not be checked.
    pub missing: Vec<String>,
}

impl DependencyCheck {
    pub fn is_satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Names of the projects that must be complete before `project` can be deployed.
pub fn dependency_names(project: &Project) -> Vec<String> {
    let mut names = Vec::new();
    if project.mode() == ProjectMode::Managed {
        names.push(MANAGER_PROJECT.to_string());
    }
    for name in project.required_dependencies() {
        if !names.iter().any(|existing| existing == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Check all required dependencies of `project`.
///
/// Every dependency is checked, concurrently, so the result lists all missing ones.
pub async fn check_dependencies<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
) -> DependencyCheck {
    let names = dependency_names(project);
    let results = join_all(names.iter().map(|name| check_dependency(resolver, name))).await;

    let missing = names
        .into_iter()
        .zip(results)
        .filter_map(|(name, result)| match result {
            Ok(true) => None,
            Ok(false) => {
                tracing::debug!(dependency = %name, "Dependency not deployed");
                Some(name)
            }
            Err(err) => {
                tracing::warn!(
                    dependency = %name,
                    error = %format!("{:#}", err),
                    "Dependency check failed"
                );
                Some(name)
            }
        })
        .collect();

    DependencyCheck { missing }
}

async fn check_dependency<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    name: &str,
) -> anyhow::Result<bool> {
    let dependency = resolver.loader().load(name)?;
    if !check_deployment_status(resolver, &dependency).await? {
        return Ok(false);
    }
    resolver.resolve_exports(&dependency).await?;
    Ok(true)
}
