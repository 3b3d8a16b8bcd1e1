use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use crate::settings::SettingsOverrides;

/// Default location of the settings file.
const DEFAULT_CONFIG_PATH: &str = "cascade.toml";

#[derive(Parser)]
#[command(name = "cascade")]
#[command(
    author,
    version,
    about = "Deploy smart contract projects step by step, resumable and pre-signable"
)]
pub struct Cli {
    /// The URL of the execution-layer JSON-RPC endpoint.
    ///
    /// Defaults to http://127.0.0.1:8545.
    #[arg(short, long, global = true)]
    pub rpchost: Option<Url>,

    /// The deployer private key as 64 hex characters.
    ///
    /// Pass `env` to read it from the DEPLOYER_PRIVKEY environment variable.
    #[arg(short, long, global = true, env = "CASCADE_PRIVKEY", hide_env_values = true)]
    pub privkey: Option<String>,

    /// Max fee per gas in gwei.
    #[arg(long, global = true)]
    pub maxfeepergas: Option<f64>,

    /// Max priority fee per gas in gwei.
    #[arg(long, global = true)]
    pub maxpriofee: Option<f64>,

    /// Gas limit for steps without their own.
    #[arg(long, global = true)]
    pub maxgaslimit: Option<u64>,

    /// The directory containing the project directories.
    #[arg(long, global = true)]
    pub projects: Option<PathBuf>,

    /// Path to a settings file. Missing files are ignored.
    #[arg(
        long,
        alias = "conf",
        global = true,
        env = "CASCADE_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true, env = "CASCADE_VERBOSE")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Settings passed on the command line.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            rpchost: self.rpchost.clone(),
            maxfeepergas: self.maxfeepergas,
            maxpriofee: self.maxpriofee,
            maxgaslimit: self.maxgaslimit,
            projects: self.projects.clone(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Deploy a project, resuming a partial deployment.
    Deploy {
        /// The project name.
        project: String,
    },
    /// Sign all steps of a managed project with the owner key.
    Sign {
        /// The project name.
        project: String,
    },
    /// Submit the project's contract sources to block explorers.
    VerifyCodes {
        /// The project name.
        project: String,

        /// Path to the explorers file.
        #[arg(long)]
        explorers: PathBuf,
    },
    /// Show the deployment progress and dependencies of a project.
    Status {
        /// The project name.
        project: String,
    },
}
