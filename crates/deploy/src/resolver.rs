//! Resolution of symbolic references in project definitions.
//!
//! A reference is a colon-delimited token:
//!
//! - `contract:<addr>` a literal address.
//! - `create:<n>[:<m>...]` the address created at nonce `n` by the project's deployer
//!   account, then at nonce `m` by that contract, and so on.
//! - `ref:<name>` / `ref:<project>.<name>` an export of this or another project.
//! - `ether:<decimal>` an ether amount as hex wei.
//!
//! Anything else resolves to itself. Inside larger strings references are written as
//! `{...}` placeholders.

use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
    sync::{Mutex, PoisonError},
};

use alloy_core::primitives::Address;
use anyhow::Context;
use futures::{FutureExt, future::BoxFuture};

use crate::{
    address::create_chain,
    chain::ChainClient,
    manager,
    project::{MANAGER_EXPORT, MANAGER_PROJECT, Project, ProjectLoader, ProjectMode},
    units::{parse_ether, to_hex_quantity},
};

/// Maximum number of `ref:` hops followed before a reference is considered cyclic.
pub const MAX_REFERENCE_DEPTH: usize = 16;

/// Resolves references against the loaded projects and the chain.
pub struct Resolver<'a, C> {
    loader: &'a ProjectLoader,
    client: &'a C,
    deployers: Mutex<HashMap<String, Address>>,
}

impl<'a, C: ChainClient> Resolver<'a, C> {
    pub fn new(loader: &'a ProjectLoader, client: &'a C) -> Self {
        Self {
            loader,
            client,
            deployers: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &'a ProjectLoader {
        self.loader
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    /// Resolve a single reference in the context of `project`.
    pub async fn resolve_reference(
        &self,
        project: &Project,
        reference: &str,
    ) -> anyhow::Result<String> {
        self.resolve_at_depth(project, reference, 0).await
    }

    fn resolve_at_depth<'b>(
        &'b self,
        project: &'b Project,
        reference: &'b str,
        depth: usize,
    ) -> BoxFuture<'b, anyhow::Result<String>> {
        async move {
            if depth > MAX_REFERENCE_DEPTH {
                anyhow::bail!(
                    "Reference `{}` in project `{}` exceeds {} levels, possible cycle",
                    reference,
                    project.name(),
                    MAX_REFERENCE_DEPTH
                );
            }

            let Some((kind, rest)) = reference.split_once(':') else {
                return Ok(reference.to_string());
            };

            match kind {
                "contract" => Ok(rest.to_string()),
                "create" => self.resolve_create(project, rest).await,
                "ref" => {
                    let (target, export) = match rest.split_once('.') {
                        Some((target, export)) => (self.loader.load(target)?, export),
                        None => (self.loader.load(project.name())?, rest),
                    };
                    let value = target.exports().get(export).with_context(|| {
                        format!("Unknown export `{}` of project `{}`", export, target.name())
                    })?;
                    self.resolve_at_depth(&target, value, depth + 1).await
                }
                "ether" => Ok(to_hex_quantity(parse_ether(rest)?)),
                _ => Ok(reference.to_string()),
            }
        }
        .boxed()
    }

    async fn resolve_create(&self, project: &Project, nonces: &str) -> anyhow::Result<String> {
        if project.mode() != ProjectMode::Managed {
            anyhow::bail!(
                "`create:{}` used in project `{}`, which has no deployer account",
                nonces,
                project.name()
            );
        }

        let nonces = nonces
            .split(':')
            .map(|n| {
                n.trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid create nonce `{}`", n))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let deployer = self.deployer_address(project).await?;
        Ok(create_chain(deployer, &nonces).to_string())
    }

    /// Expand every `{...}` placeholder in `input`.
    ///
    /// Substituted values lose their `0x` prefix so they can be spliced into hex blobs.
    pub async fn resolve_placeholders(
        &self,
        project: &Project,
        input: &str,
    ) -> anyhow::Result<String> {
        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            output.push_str(&rest[..start]);

            let reference = &rest[start + 1..start + len];
            let value = self.resolve_reference(project, reference).await?;
            output.push_str(value.strip_prefix("0x").unwrap_or(&value));

            rest = &rest[start + len + 1..];
        }
        output.push_str(rest);

        Ok(output)
    }

    /// Resolve a field that holds one value, such as an address or an amount.
    ///
    /// A field made of a single placeholder resolves to the referenced value with its
    /// prefix intact. Otherwise placeholders are expanded and the result is resolved as a
    /// reference.
    pub async fn resolve_value(&self, project: &Project, input: &str) -> anyhow::Result<String> {
        let input = input.trim();
        if let Some(reference) = single_placeholder(input) {
            return self.resolve_reference(project, reference).await;
        }

        let expanded = self.resolve_placeholders(project, input).await?;
        self.resolve_reference(project, &expanded).await
    }

    /// Resolve a field that must yield an address.
    pub async fn resolve_address(&self, project: &Project, input: &str) -> anyhow::Result<Address> {
        let value = self.resolve_value(project, input).await?;
        Address::from_str(&value).with_context(|| {
            format!("`{}` does not resolve to an address (got `{}`)", input, value)
        })
    }

    /// Resolve all exports of `project`.
    pub async fn resolve_exports(
        &self,
        project: &Project,
    ) -> anyhow::Result<BTreeMap<String, String>> {
        let mut exports = BTreeMap::new();
        for (name, reference) in project.exports() {
            let value = self
                .resolve_reference(project, reference)
                .await
                .with_context(|| {
                    format!("Failed to resolve export `{}` of `{}`", name, project.name())
                })?;
            exports.insert(name.clone(), value);
        }
        Ok(exports)
    }

    /// Address of the deployment manager, taken from the reserved manager project.
    pub async fn manager_address(&self) -> anyhow::Result<Address> {
        let manager = self.loader.load(MANAGER_PROJECT)?;
        let reference = manager.exports().get(MANAGER_EXPORT).with_context(|| {
            format!("Project `{}` does not export `{}`", MANAGER_PROJECT, MANAGER_EXPORT)
        })?;
        self.resolve_address(&manager, reference).await
    }

    /// Deployer account of a managed project, as reported by the manager.
    pub async fn deployer_address(&self, project: &Project) -> anyhow::Result<Address> {
        if let Some(deployer) = self.cached_deployer(project.name()) {
            return Ok(deployer);
        }

        let manager = self.manager_address().await?;
        let deployer = manager::deployer_address(self.client, manager, project.account()?).await?;
        tracing::debug!(project = %project.name(), %deployer, "Resolved deployer account");

        self.deployers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project.name().to_string(), deployer);

        Ok(deployer)
    }

    fn cached_deployer(&self, project: &str) -> Option<Address> {
        self.deployers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(project)
            .copied()
    }
}

/// The reference inside `input` when `input` is exactly one `{...}` placeholder.
pub fn single_placeholder(input: &str) -> Option<&str> {
    input
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|inner| !inner.contains(['{', '}']))
}
