//! Runtime settings.
//!
//! Sources are merged in order, later ones winning:
//! 1. Built-in defaults
//! 2. The TOML settings file, if present
//! 3. Environment variables prefixed with `CASCADE_`
//! 4. Command line flags

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use cascade_deploy::{
    FeeConfig, chain::DEFAULT_RECEIPT_POLL_INTERVAL, txbuilder::DEFAULT_GAS_LIMIT,
};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

const ENV_PREFIX: &str = "CASCADE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub rpchost: Url,
    /// Gwei.
    pub maxfeepergas: f64,
    /// Gwei.
    pub maxpriofee: f64,
    pub maxgaslimit: u64,
    pub projects: PathBuf,
    pub receipt_poll_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let fees = FeeConfig::default();
        Self {
            rpchost: Url::parse("http://127.0.0.1:8545").expect("valid default url"),
            maxfeepergas: fees.max_fee_per_gas,
            maxpriofee: fees.max_priority_fee_per_gas,
            maxgaslimit: fees.max_gas_limit.unwrap_or(DEFAULT_GAS_LIMIT),
            projects: PathBuf::from("./projects"),
            receipt_poll_interval_ms: DEFAULT_RECEIPT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Settings given on the command line. Unset flags do not override anything.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SettingsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpchost: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxfeepergas: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxpriofee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxgaslimit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<PathBuf>,
}

impl Settings {
    pub fn load(config: &Path, overrides: &SettingsOverrides) -> anyhow::Result<Self> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
            .extract()
            .with_context(|| format!("Failed to load settings from {}", config.display()))
    }

    pub fn fees(&self) -> FeeConfig {
        FeeConfig {
            max_fee_per_gas: self.maxfeepergas,
            max_priority_fee_per_gas: self.maxpriofee,
            max_gas_limit: Some(self.maxgaslimit),
        }
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}
