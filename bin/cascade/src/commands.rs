use std::path::Path;

use anyhow::Context;
use cascade_deploy::{
    DeployOutcome, DeploymentStatus, ExplorersConfig, MessageSigner, PrivateKeySigner,
    ProjectLoader, Resolver, RpcClient, TransactionBuilder, check_dependencies, dependency_names,
    deploy, deployment_status, parse_private_key, sign_project, verify_project_codes,
};
use comfy_table::Table;

use crate::settings::Settings;

fn private_key(privkey: Option<&str>) -> anyhow::Result<PrivateKeySigner> {
    let privkey = privkey.context("A private key is required, pass --privkey")?;
    parse_private_key(privkey)
}

pub async fn run_deploy(
    settings: &Settings,
    privkey: Option<&str>,
    name: &str,
) -> anyhow::Result<()> {
    let signer = private_key(privkey)?;
    let loader = ProjectLoader::new(&settings.projects);
    let project = loader.load(name)?;

    let client = RpcClient::new(settings.rpchost.clone())?;
    let resolver = Resolver::new(&loader, &client);
    let mut builder = TransactionBuilder::new(client.clone(), signer, settings.fees())
        .await?
        .with_poll_interval(settings.receipt_poll_interval());

    match deploy(&resolver, &project, &mut builder).await? {
        DeployOutcome::AlreadyDeployed => {}
        DeployOutcome::MissingDependencies(missing) => {
            tracing::warn!(project = %name, missing = %missing.join(", "), "Deployment skipped");
        }
        DeployOutcome::Deployed(report) => {
            tracing::info!(
                project = %name,
                wallet = %builder.address(),
                nonce = builder.wallet().nonce,
                receipts = report.receipts.len(),
                "Project deployed"
            );
        }
    }

    Ok(())
}

pub async fn run_sign(
    settings: &Settings,
    privkey: Option<&str>,
    name: &str,
) -> anyhow::Result<()> {
    let signer = MessageSigner::new(private_key(privkey)?);
    let loader = ProjectLoader::new(&settings.projects);
    let project = loader.load(name)?;

    let client = RpcClient::new(settings.rpchost.clone())?;
    let resolver = Resolver::new(&loader, &client);
    let outcome = sign_project(&resolver, &project, &signer).await?;

    tracing::info!(
        project = %name,
        signatures = outcome.signatures,
        updated = outcome.updated,
        "Signing completed"
    );
    Ok(())
}

pub async fn run_verify_codes(
    settings: &Settings,
    name: &str,
    explorers: &Path,
) -> anyhow::Result<()> {
    let loader = ProjectLoader::new(&settings.projects);
    let project = loader.load(name)?;

    let config = ExplorersConfig::load_from_file(explorers)?;
    if config.explorers.is_empty() {
        tracing::warn!(path = %explorers.display(), "No explorers configured");
        return Ok(());
    }

    let client = RpcClient::new(settings.rpchost.clone())?;
    let resolver = Resolver::new(&loader, &client);
    let reports = verify_project_codes(&resolver, &project, &config.explorers).await?;

    let verified = reports.iter().filter(|report| report.outcome.is_some()).count();
    tracing::info!(project = %name, verified, total = reports.len(), "Code verification completed");
    Ok(())
}

pub async fn run_status(settings: &Settings, name: &str) -> anyhow::Result<()> {
    let loader = ProjectLoader::new(&settings.projects);
    let project = loader.load(name)?;

    let client = RpcClient::new(settings.rpchost.clone())?;
    let resolver = Resolver::new(&loader, &client);
    let (status, dependencies) = tokio::join!(
        deployment_status(&resolver, &project),
        check_dependencies(&resolver, &project)
    );

    let mut table = Table::new();
    table.set_header(vec!["Project", "Role", "Mode", "Steps", "Progress", "State"]);
    table.add_row(match status {
        Ok(status) => status_row(&status, "target"),
        Err(err) => {
            tracing::warn!(project = %name, error = %format!("{:#}", err), "Status check failed");
            error_row(name, "target", &err)
        }
    });

    for dependency in dependency_names(&project) {
        let row = match loader.load(&dependency) {
            Ok(project) => match deployment_status(&resolver, &project).await {
                Ok(status) => status_row(&status, "dependency"),
                Err(err) => error_row(&dependency, "dependency", &err),
            },
            Err(err) => error_row(&dependency, "dependency", &err),
        };
        table.add_row(row);
    }

    println!("{table}");
    if !dependencies.is_satisfied() {
        tracing::warn!(
            project = %name,
            missing = %dependencies.missing.join(", "),
            "Missing dependencies"
        );
    }
    Ok(())
}

fn status_row(status: &DeploymentStatus, role: &str) -> Vec<String> {
    vec![
        status.project.clone(),
        role.to_string(),
        status.mode.to_string(),
        status.steps.to_string(),
        format!("{}/{}", status.progress, status.target),
        status.state().to_string(),
    ]
}

fn error_row(name: &str, role: &str, err: &anyhow::Error) -> Vec<String> {
    vec![
        name.to_string(),
        role.to_string(),
        "-".to_string(),
        "-".to_string(),
        "-".to_string(),
        format!("error: {:#}", err),
    ]
}
