//! Project definitions and their loader.
//!
//! Each project lives in `<projects>/<name>/deployment.yaml`. Projects reference each
//! other by name through dependencies and `ref:` exports.

mod loader;
mod step;
mod value;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::{Address, U256};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use loader::ProjectLoader;
pub use step::{
    AbiArgument, AbiCall, CallStep, Condition, Create2Step, CreateStep, PublishStep, Step,
    StepAction,
};
pub use value::{Scalar, parse_u256};

use crate::verify::CodeInput;

/// Name of the reserved project that describes the deployment manager.
pub const MANAGER_PROJECT: &str = "_manager";

/// Export of [`MANAGER_PROJECT`] holding the manager contract address.
pub const MANAGER_EXPORT: &str = "DeploymentManager";

/// File name of a project definition inside its directory.
pub const DEFINITION_FILE: &str = "deployment.yaml";

/// File name of the stored step signatures inside a project directory.
pub const SIGNATURES_FILE: &str = "signatures.yaml";

/// How the steps of a project reach the chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProjectMode {
    /// Steps are plain transactions sent by the deployer wallet.
    #[serde(alias = "unmanaged")]
    #[strum(to_string = "standalone", serialize = "unmanaged")]
    Standalone,
    /// Steps are executed by the deployment manager on behalf of the project owner.
    Managed,
}

/// Owner account of a managed project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAccount {
    pub address: Address,
    /// Salt selecting one of the owner's deployer accounts.
    #[serde(default, deserialize_with = "value::deserialize_u256")]
    pub salt: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Dependency {
    pub project: String,
    #[serde(default)]
    pub required: bool,
}

/// The parsed content of a `deployment.yaml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectDefinition {
    pub mode: ProjectMode,
    #[serde(default)]
    pub account: Option<ProjectAccount>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    /// Symbolic name to reference string.
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Default gas limit for steps of this project.
    #[serde(default)]
    pub gas: Option<u64>,
    /// Source verification inputs keyed by the reference of the deployed contract.
    #[serde(default, rename = "code-verify")]
    pub code_verify: BTreeMap<String, CodeInput>,
}

impl ProjectDefinition {
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let definition: Self =
            serde_yaml::from_str(content).context("Failed to parse project definition")?;
        definition.validate()?;
        Ok(definition)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.mode == ProjectMode::Managed && self.account.is_none() {
            anyhow::bail!("Managed project requires an `account` section");
        }
        Ok(())
    }
}

/// A loaded project.
#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    path: PathBuf,
    definition: ProjectDefinition,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        definition: ProjectDefinition,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            definition,
        }
    }

    /// Load the project stored in `path`.
    pub fn load(name: &str, path: &Path) -> anyhow::Result<Self> {
        let file = path.join(DEFINITION_FILE);
        if !file.exists() {
            anyhow::bail!("Could not load {}", file.display());
        }

        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let definition = ProjectDefinition::from_yaml(&content)
            .with_context(|| format!("Invalid project `{}`", name))?;

        Ok(Self::new(name, path, definition))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> ProjectMode {
        self.definition.mode
    }

    pub fn definition(&self) -> &ProjectDefinition {
        &self.definition
    }

    pub fn steps(&self) -> &[Step] {
        &self.definition.steps
    }

    pub fn exports(&self) -> &BTreeMap<String, String> {
        &self.definition.exports
    }

    /// Project-level gas limit default.
    pub fn gas(&self) -> Option<u64> {
        self.definition.gas
    }

    /// The owner account. Fails for projects without one.
    pub fn account(&self) -> anyhow::Result<&ProjectAccount> {
        self.definition
            .account
            .as_ref()
            .with_context(|| format!("Project `{}` has no account", self.name))
    }

    /// Names of the dependencies that must be deployed before this project.
    pub fn required_dependencies(&self) -> impl Iterator<Item = &str> {
        self.definition
            .dependencies
            .iter()
            .filter(|dep| dep.required)
            .map(|dep| dep.project.as_str())
    }

    pub fn signatures_path(&self) -> PathBuf {
        self.path.join(SIGNATURES_FILE)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const MANAGED: &str = r#"
mode: managed
account:
  address: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
  salt: 3
dependencies:
  - project: token
    required: true
  - project: docs
exports:
  Vault: create:0
steps:
  - action: create
    bytecode: "0x6080"
"#;

    #[test]
    fn test_parse_managed_project() {
        let definition = ProjectDefinition::from_yaml(MANAGED).unwrap();
        let project = Project::new("vault", "/tmp/vault", definition);

        assert_eq!(project.mode(), ProjectMode::Managed);
        assert_eq!(project.account().unwrap().salt, U256::from(3));
        assert_eq!(project.required_dependencies().collect::<Vec<_>>(), vec!["token"]);
        assert_eq!(project.exports()["Vault"], "create:0");
        assert_eq!(project.steps().len(), 1);
        assert_eq!(project.signatures_path(), PathBuf::from("/tmp/vault/signatures.yaml"));
    }

    #[test]
    fn test_unmanaged_alias() {
        let definition = ProjectDefinition::from_yaml("mode: unmanaged").unwrap();
        assert_eq!(definition.mode, ProjectMode::Standalone);
        assert!(definition.steps.is_empty());
        assert_eq!(ProjectMode::from_str("unmanaged").unwrap(), ProjectMode::Standalone);
        assert_eq!(ProjectMode::Managed.to_string(), "managed");
    }

    #[test]
    fn test_unknown_mode_fails() {
        assert!(ProjectDefinition::from_yaml("mode: hybrid").is_err());
    }

    #[test]
    fn test_managed_without_account_fails() {
        let err = ProjectDefinition::from_yaml("mode: managed").unwrap_err();
        assert!(err.to_string().contains("account"));
    }

    #[test]
    fn test_standalone_has_no_account() {
        let definition = ProjectDefinition::from_yaml("mode: standalone").unwrap();
        let project = Project::new("plain", "/tmp/plain", definition);
        assert!(project.account().is_err());
    }
}
