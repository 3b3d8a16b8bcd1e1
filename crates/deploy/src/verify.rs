//! Contract source verification on etherscan-compatible block explorers.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::Context;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use strum::Display;
use url::Url;

use crate::{chain::ChainClient, project::Project, resolver::Resolver, rpc::create_client};

/// Compiler input of a deployed contract, from the `code-verify` section of a project.
///
/// Paths are relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CodeInput {
    /// A solc standard-JSON input file.
    StandardJson {
        input: PathBuf,
        compiler: String,
        contract: String,
    },
    /// A single flattened source file.
    Source {
        code: PathBuf,
        compiler: String,
        /// Optimizer runs, `false` when the optimizer was off.
        #[serde(default, deserialize_with = "deserialize_optimize")]
        optimize: Option<u64>,
        contract: String,
        #[serde(default)]
        evmver: Option<String>,
    },
}

impl CodeInput {
    pub fn contract(&self) -> &str {
        match self {
            CodeInput::StandardJson { contract, .. } | CodeInput::Source { contract, .. } => {
                contract
            }
        }
    }

    /// Build the form fields of the verification request.
    pub fn form_fields(
        &self,
        address: Address,
        project_path: &Path,
    ) -> anyhow::Result<Vec<(&'static str, String)>> {
        let fields = match self {
            CodeInput::StandardJson {
                input,
                compiler,
                contract,
            } => vec![
                ("module", "contract".to_string()),
                ("action", "verifysourcecode".to_string()),
                ("codeformat", "solidity-standard-json-input".to_string()),
                ("contractaddress", address.to_string()),
                ("contractname", contract.clone()),
                ("compilerversion", compiler.clone()),
                ("sourceCode", read_source(project_path, input)?),
                ("autodetectConstructorArguments", "1".to_string()),
            ],
            CodeInput::Source {
                code,
                compiler,
                optimize,
                contract,
                evmver,
            } => vec![
                ("module", "contract".to_string()),
                ("action", "verify".to_string()),
                ("addressHash", address.to_string()),
                ("name", contract.clone()),
                ("compilerVersion", compiler.clone()),
                ("optimization", optimize.is_some().to_string()),
                ("optimizationRuns", optimize.unwrap_or(0).to_string()),
                ("evmVersion", evmver.clone().unwrap_or_else(|| "default".to_string())),
                ("contractSourceCode", read_source(project_path, code)?),
                ("autodetectConstructorArguments", "true".to_string()),
            ],
        };
        Ok(fields)
    }
}

fn read_source(project_path: &Path, file: &Path) -> anyhow::Result<String> {
    let path = project_path.join(file);
    std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
}

fn deserialize_optimize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Optimize {
        Runs(u64),
        Flag(bool),
    }

    match Optimize::deserialize(deserializer)? {
        Optimize::Runs(0) | Optimize::Flag(false) => Ok(None),
        Optimize::Runs(runs) => Ok(Some(runs)),
        Optimize::Flag(true) => Err(serde::de::Error::custom(
            "optimize must be the number of optimizer runs or false",
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExplorerKind {
    Etherscan,
    Blockscout,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Explorer {
    /// API endpoint receiving the verification form.
    pub url: Url,
    #[serde(rename = "type")]
    pub kind: ExplorerKind,
}

/// Content of an explorers file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExplorersConfig {
    #[serde(default)]
    pub explorers: Vec<Explorer>,
}

impl ExplorersConfig {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("Could not find {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read explorers from {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse explorers file {}", path.display()))
    }
}

/// Explorer answer to a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
    Rejected(Value),
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationOutcome::Verified => write!(f, "OK"),
            VerificationOutcome::AlreadyVerified => write!(f, "already verified"),
            VerificationOutcome::Rejected(response) => write!(f, "rejected: {}", response),
        }
    }
}

impl VerificationOutcome {
    pub fn from_response(response: Value) -> Self {
        let status_ok = match response.get("status") {
            Some(Value::String(status)) => status == "1",
            Some(Value::Number(status)) => status.as_u64() == Some(1),
            _ => false,
        };
        if status_ok {
            return VerificationOutcome::Verified;
        }

        let already_verified = response
            .get("message")
            .and_then(Value::as_str)
            .is_some_and(|message| message.contains("already verified"));
        if already_verified {
            return VerificationOutcome::AlreadyVerified;
        }

        VerificationOutcome::Rejected(response)
    }
}

/// Posts verification forms to explorers.
#[derive(Debug, Clone)]
pub struct CodeVerifier {
    client: reqwest::Client,
}

impl CodeVerifier {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            client: create_client()?,
        })
    }

    pub async fn verify(
        &self,
        explorer: &Explorer,
        address: Address,
        input: &CodeInput,
        project_path: &Path,
    ) -> anyhow::Result<VerificationOutcome> {
        let fields = input.form_fields(address, project_path)?;

        let response: Value = self
            .client
            .post(explorer.url.clone())
            .form(&fields)
            .send()
            .await
            .with_context(|| format!("Failed to send verification request to {}", explorer.url))?
            .json()
            .await
            .with_context(|| {
                format!("Failed to parse verification response from {}", explorer.url)
            })?;

        Ok(VerificationOutcome::from_response(response))
    }
}

/// Result of verifying one contract on one explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub explorer: Url,
    pub reference: String,
    pub contract: String,
    /// `None` when the request could not be made or the reference did not resolve.
    pub outcome: Option<VerificationOutcome>,
}

/// Verify every `code-verify` entry of `project` on every explorer.
///
/// Failures are logged and reported per explorer and contract; they never abort the run.
pub async fn verify_project_codes<C: ChainClient>(
    resolver: &Resolver<'_, C>,
    project: &Project,
    explorers: &[Explorer],
) -> anyhow::Result<Vec<VerificationReport>> {
    let verifier = CodeVerifier::new()?;
    let entries = &project.definition().code_verify;

    let mut addresses = Vec::with_capacity(entries.len());
    for (reference, input) in entries {
        let address = match resolver.resolve_address(project, reference).await {
            Ok(address) => Some(address),
            Err(err) => {
                tracing::error!(
                    project = %project.name(),
                    reference = %reference,
                    contract = %input.contract(),
                    error = %format!("{:#}", err),
                    "Failed to resolve contract address"
                );
                None
            }
        };
        addresses.push((reference, input, address));
    }

    let mut reports = Vec::new();
    for explorer in explorers {
        for (reference, input, address) in &addresses {
            let Some(address) = address else {
                reports.push(VerificationReport {
                    explorer: explorer.url.clone(),
                    reference: reference.to_string(),
                    contract: input.contract().to_string(),
                    outcome: None,
                });
                continue;
            };

            let outcome = match verifier.verify(explorer, *address, input, project.path()).await {
                Ok(outcome) => {
                    tracing::info!(
                        explorer = %explorer.url,
                        %address,
                        contract = %input.contract(),
                        outcome = %outcome,
                        "Verified contract source"
                    );
                    Some(outcome)
                }
                Err(err) => {
                    tracing::error!(
                        explorer = %explorer.url,
                        %address,
                        contract = %input.contract(),
                        error = %format!("{:#}", err),
                        "Error while verifying contract source"
                    );
                    None
                }
            };

            reports.push(VerificationReport {
                explorer: explorer.url.clone(),
                reference: reference.to_string(),
                contract: input.contract().to_string(),
                outcome,
            });
        }
    }

    Ok(reports)
}
