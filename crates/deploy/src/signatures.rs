//! The `signatures.yaml` file of a managed project.
//!
//! Signatures are stored per deployment manager so a project can be signed for several
//! networks:
//!
//! ```yaml
//! 0x4e59b44847b379578588920ca78fbf26c0b4956c:
//!   signtime: 1700000000
//!   signatures:
//!     - 0x...
//! ```

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signatures for all steps of a project, aligned by step index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    /// Unix timestamp of the signing run.
    pub signtime: i64,
    pub signatures: Vec<Bytes>,
}

impl SignatureSet {
    pub fn signed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.signtime, 0)
    }

    /// Human-readable signing time for logs.
    pub fn render_signtime(&self) -> String {
        self.signed_at()
            .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| self.signtime.to_string())
    }
}

/// Content of a `signatures.yaml`, keyed by lowercase manager address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignaturesFile {
    managers: BTreeMap<String, SignatureSet>,
}

fn manager_key(manager: Address) -> String {
    format!("{:#x}", manager)
}

impl SignaturesFile {
    /// Load the file, or an empty set of signatures if it does not exist.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signatures from {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse signatures file {}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize signatures")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write signatures to {}", path.display()))?;

        Ok(())
    }

    /// Signatures stored for `manager`.
    pub fn get(&self, manager: Address) -> Option<&SignatureSet> {
        self.managers.get(&manager_key(manager))
    }

    /// Store `signatures` for `manager` unless the same set is already stored.
    ///
    /// Returns whether anything changed.
    pub fn update(&mut self, manager: Address, signatures: Vec<Bytes>, signtime: i64) -> bool {
        let key = manager_key(manager);
        if self
            .managers
            .get(&key)
            .is_some_and(|stored| stored.signatures == signatures)
        {
            return false;
        }

        self.managers.insert(
            key,
            SignatureSet {
                signtime,
                signatures,
            },
        );
        true
    }
}
