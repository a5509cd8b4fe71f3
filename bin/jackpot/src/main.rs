//! jackpot deploys the jackpot contracts and verifies their source on a block explorer.

mod cli;
mod output;

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};

use cli::{Cli, Command, RunOptions, Target};
use jackpot_release::{
    CONFIG_FILENAME, ChainClient, ConfirmationPolicy, ConstructorArgumentSet, DeploymentExecutor,
    DeploymentRecord, DeploymentResult, ParameterBinder, ReleaseConfig, ReleaseError,
    ReleaseOrchestrator, ReleaseReport, RpcChainClient, SimulatedChain, SimulatedExplorer,
    VerificationOutcome, VerificationRequest, VerificationService, Verifier,
    verify::VerificationSubmitter,
};

/// Prefix of environment variables overriding configuration values.
const ENV_PREFIX: &str = "JACKPOT_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Deploy,
    Release,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Init { force } => init(&cli.config, force),
        Command::Plan { target } => plan(&cli.config, &target),
        Command::Deploy { target, run } => {
            interruptible(run_releases(&cli.config, &target, &run, Stage::Deploy)).await
        }
        Command::Release { target, run } => {
            interruptible(run_releases(&cli.config, &target, &run, Stage::Release)).await
        }
        Command::Verify {
            network,
            contract,
            address,
            records,
        } => {
            interruptible(verify(
                &cli.config,
                &network,
                contract.as_deref(),
                address.as_deref(),
                &records,
            ))
            .await
        }
    }
}

/// Resolve `--config` to the configuration file itself.
fn config_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(CONFIG_FILENAME)
    } else {
        path.to_path_buf()
    }
}

/// Load the configuration with environment overrides, and the directory artifacts are relative to.
///
/// `JACKPOT_NETWORKS__GOERLI__PRIVATE_KEY` sets `networks.goerli.private_key`.
fn load_config(path: &Path) -> Result<(ReleaseConfig, PathBuf)> {
    let file = config_file(path);
    if !file.exists() {
        anyhow::bail!(
            "Configuration file not found: {} (run `jackpot init` to create one)",
            file.display()
        );
    }

    let config: ReleaseConfig = Figment::new()
        .merge(Toml::file(&file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", file.display()))?;

    let project_dir = file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    tracing::debug!(
        path = %file.display(),
        contracts = config.contracts.len(),
        networks = config.networks.len(),
        "Configuration loaded"
    );

    Ok((config, project_dir))
}

/// The contract to act on: the one named, or the only one declared.
fn resolve_contract(config: &ReleaseConfig, contract: Option<&str>) -> Result<String> {
    if let Some(contract) = contract {
        return Ok(contract.to_string());
    }

    let mut names = config.contracts.keys();
    match (names.next(), names.next()) {
        (Some(only), None) => Ok(only.clone()),
        (None, _) => anyhow::bail!("The configuration declares no contracts"),
        _ => anyhow::bail!("The configuration declares several contracts; pick one with --contract"),
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    let file = config_file(path);
    if file.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite it)",
            file.display()
        );
    }

    ReleaseConfig::template().save_to_file(&file)?;

    tracing::info!(
        path = %file.display(),
        "Fill in rpc_url per network; provide keys through {}NETWORKS__<NETWORK>__PRIVATE_KEY",
        ENV_PREFIX
    );
    Ok(())
}

fn plan(path: &Path, target: &Target) -> Result<()> {
    let (config, _) = load_config(path)?;
    let contract = resolve_contract(&config, target.contract.as_deref())?;
    let binder = ParameterBinder::new(config);

    for network in &target.networks {
        let arguments = binder.bind(&contract, network)?;
        let signer = binder.signer(network)?;

        println!("{contract} on {network} (deployer {})", signer.address());
        println!("{}", output::plan_table(&arguments));
    }
    Ok(())
}

/// Orchestrator talking to the network's RPC endpoint. The configured
/// explorer is attached only for a release.
///
/// No request is made here: the client connects on first use.
fn on_chain(
    config: &ReleaseConfig,
    project_dir: &Path,
    network: &str,
    stage: Stage,
) -> Result<ReleaseOrchestrator<RpcChainClient, Verifier>> {
    let profile = config
        .networks
        .get(network)
        .ok_or_else(|| ReleaseError::MissingParameter(format!("networks.{network}")))?;
    let rpc_url = profile
        .rpc_url
        .clone()
        .ok_or_else(|| ReleaseError::MissingParameter(format!("networks.{network}.rpc_url")))?;

    let policy = ConfirmationPolicy {
        gas_limit: profile.gas_limit,
        gas_price: profile.gas_price_wei.map(u128::from),
        ..ConfirmationPolicy::from(config.policy_for(profile))
    };

    let client = RpcChainClient::new(rpc_url, profile.chain_id)?;
    let mut orchestrator = ReleaseOrchestrator::new(
        ParameterBinder::new(config.clone()),
        DeploymentExecutor::new(client, policy),
    )
    .with_project_dir(project_dir);

    if stage == Stage::Release {
        if let Some(explorer) = &profile.explorer {
            orchestrator =
                orchestrator.with_verifier(Verifier::from_config(network, Some(explorer))?);
        }
    }

    Ok(orchestrator)
}

/// Orchestrator backed by an in-memory chain and explorer.
fn simulated(
    config: &ReleaseConfig,
    project_dir: &Path,
    contract: &str,
) -> Result<ReleaseOrchestrator<SimulatedChain, SimulatedExplorer>> {
    let chain = SimulatedChain::new();
    let policy = ConfirmationPolicy::from(config.deploy);

    let orchestrator: ReleaseOrchestrator<SimulatedChain, SimulatedExplorer> =
        ReleaseOrchestrator::new(
            ParameterBinder::new(config.clone()),
            DeploymentExecutor::new(chain.clone(), policy),
        )
        .with_project_dir(project_dir);

    let artifact = orchestrator.load_artifact(contract)?;
    Ok(orchestrator.with_verifier(SimulatedExplorer::new(chain, artifact.bytecode)))
}

async fn run_releases(path: &Path, target: &Target, run: &RunOptions, stage: Stage) -> Result<()> {
    let (config, project_dir) = load_config(path)?;
    let contract = resolve_contract(&config, target.contract.as_deref())?;

    if run.dry_run {
        tracing::info!("Dry run: using an in-memory chain and explorer");
    }

    let mut reports = Vec::with_capacity(target.networks.len());

    // One network at a time: they may share a deployer key.
    for network in &target.networks {
        let result = if run.dry_run {
            let orchestrator = simulated(&config, &project_dir, &contract)?;
            execute(&orchestrator, &contract, network, stage, None).await
        } else {
            if let Some(record) = DeploymentRecord::find(&run.records, network, &contract)? {
                if !run.redeploy {
                    anyhow::bail!(
                        "{contract} is already deployed on {network} at {} (use --redeploy to deploy again)",
                        record.address
                    );
                }
                tracing::warn!(%network, previous = %record.address, "Redeploying");
            }

            let orchestrator = on_chain(&config, &project_dir, network, stage)?;
            execute(&orchestrator, &contract, network, stage, Some(&run.records)).await
        };

        match result {
            Ok(report) => reports.push(report),
            Err(e) => {
                if !reports.is_empty() {
                    println!("{}", output::report_table(&reports));
                }
                return Err(e);
            }
        }
    }

    println!("{}", output::report_table(&reports));
    Ok(())
}

/// Run one deploy or release and persist what was confirmed.
///
/// A record that cannot be written never hides the deployment: the error
/// names the address and transaction.
async fn execute<C: ChainClient, V: VerificationService>(
    orchestrator: &ReleaseOrchestrator<C, V>,
    contract: &str,
    network: &str,
    stage: Stage,
    records: Option<&Path>,
) -> Result<ReleaseReport> {
    let result = match stage {
        Stage::Deploy => orchestrator.deploy(contract, network).await,
        Stage::Release => orchestrator.release(contract, network).await,
    };

    match result {
        Ok(report) => {
            if let Some(dir) = records {
                save_record(dir, contract, network, &report.deployment, &report.arguments)
                    .map_err(|e| e.context(unrecorded(contract, network, &report.deployment)))?;
            }
            Ok(report)
        }
        Err(failure) => {
            let mut record_error = None;

            if let (Some(deployment), Some(arguments)) = (&failure.deployment, &failure.arguments) {
                if deployment.is_confirmed() {
                    tracing::warn!(
                        address = ?deployment.contract_address,
                        tx_hash = ?deployment.transaction_hash,
                        "The contract is deployed; run `jackpot verify --network {}` once the cause is fixed",
                        network
                    );
                    if let Some(dir) = records {
                        record_error = save_record(dir, contract, network, deployment, arguments)
                            .err()
                            .map(|e| format!("{}: {e:#}", unrecorded(contract, network, deployment)));
                    }
                } else if failure.error.is_ambiguous() {
                    tracing::warn!(
                        tx_hash = ?deployment.transaction_hash,
                        "The transaction may still be mined; check it before deploying again"
                    );
                }
            }

            let error = anyhow::Error::from(failure);
            Err(match record_error {
                Some(context) => error.context(context),
                None => error,
            })
        }
    }
}

fn unrecorded(contract: &str, network: &str, deployment: &DeploymentResult) -> String {
    format!(
        "{contract} is deployed on {network} at {} (tx {}) but its deployment record was not written",
        deployment
            .contract_address
            .map_or_else(|| "-".to_string(), |a| a.to_checksum(None)),
        deployment
            .transaction_hash
            .map_or_else(|| "-".to_string(), |h| h.to_string()),
    )
}

fn save_record(
    dir: &Path,
    contract: &str,
    network: &str,
    deployment: &DeploymentResult,
    arguments: &ConstructorArgumentSet,
) -> Result<()> {
    let Some(record) = DeploymentRecord::from_result(contract, network, deployment, arguments.clone())
    else {
        return Ok(());
    };
    let path = DeploymentRecord::path(dir, network, contract);

    tracing::info!(
        address = %record.address,
        tx_hash = %record.transaction_hash,
        path = %path.display(),
        "Writing deployment record"
    );
    record.save_to_file(&path)
}

async fn verify(
    path: &Path,
    network: &str,
    contract: Option<&str>,
    address: Option<&str>,
    records: &Path,
) -> Result<()> {
    let (config, _) = load_config(path)?;
    let contract = resolve_contract(&config, contract)?;
    let address = address
        .map(|address| address.parse::<Address>().context("Invalid --address"))
        .transpose()?;

    let (address, outcome) = verify_deployed(config, network, &contract, address, records).await?;

    println!("{contract} at {address} on {network}: {}", outcome.status);
    Ok(())
}

/// Verify through the network's explorer alone: no RPC endpoint and no key needed.
async fn verify_deployed(
    config: ReleaseConfig,
    network: &str,
    contract: &str,
    address: Option<Address>,
    records: &Path,
) -> Result<(Address, VerificationOutcome)> {
    let binder = ParameterBinder::new(config);

    let (address, arguments) = match address {
        Some(address) => (address, binder.bind_arguments(contract, network)?),
        None => {
            let record = DeploymentRecord::find(records, network, contract)?.with_context(|| {
                format!("No deployment record for {contract} on {network}; pass --address")
            })?;
            (record.address, record.arguments)
        }
    };

    let explorer = binder.network(network)?.explorer.as_ref();
    let submitter = VerificationSubmitter::new(Verifier::from_config(network, explorer)?);
    let outcome = submitter
        .verify(&VerificationRequest {
            contract_address: address,
            network: network.to_string(),
            contract: binder.contract(contract)?.source.clone(),
            arguments,
        })
        .await;

    if !outcome.is_verified() {
        return Err(ReleaseError::VerificationFailed(outcome.diagnostic).into());
    }
    Ok((address, outcome))
}

/// Stop on Ctrl+C. Once a transaction is submitted its fate is unknown, so say so.
async fn interruptible<T>(task: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        result = task => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(
                "Interrupted. A submitted transaction may still be mined; check the hash logged above before retrying"
            );
            anyhow::bail!("Interrupted")
        }
    }
}
