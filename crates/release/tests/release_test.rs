//! End-to-end release scenarios against the simulated chain and explorer.

use std::{path::Path, time::Duration};

use alloy_core::primitives::{Address, Bytes, U256};
use jackpot_release::{
    ArgValue, ConfirmationPolicy, ConfirmationState, ConstructorArgumentSet, DeploymentExecutor,
    DeploymentRecord, ParameterBinder, ReleaseConfig, ReleaseError, ReleaseOrchestrator, Secret,
    SimulatedChain, SimulatedExplorer, VerificationStatus,
};
use tempdir::TempDir;

const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const BYTECODE: &str = "0x608060405234801561001057600080fd5b5061012f806100206000396000f3fe";

fn write_artifact(project: &Path, config: &ReleaseConfig) {
    let path = project.join(&config.contracts["JackpotBlock"].artifact);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        path,
        serde_json::json!({
            "_format": "hh-sol-artifact-1",
            "contractName": "JackpotBlock",
            "sourceName": "src/JackpotBlock.sol",
            "abi": [],
            "bytecode": BYTECODE,
            "deployedBytecode": "0x",
        })
        .to_string(),
    )
    .unwrap();
}

fn goerli_config() -> ReleaseConfig {
    let mut config = ReleaseConfig::template();
    let goerli = config.networks.get_mut("goerli").unwrap();
    goerli.rpc_url = Some("https://goerli.example.org".parse().unwrap());
    goerli.private_key = Some(Secret::new(DEV_KEY));
    config
}

struct Pipeline {
    project: TempDir,
    chain: SimulatedChain,
    explorer: SimulatedExplorer,
    orchestrator: ReleaseOrchestrator<SimulatedChain, SimulatedExplorer>,
}

fn pipeline(config: ReleaseConfig) -> Pipeline {
    let project = TempDir::new("jackpot-pipeline").unwrap();
    write_artifact(project.path(), &config);

    let chain = SimulatedChain::new();
    let explorer = SimulatedExplorer::new(chain.clone(), BYTECODE.parse::<Bytes>().unwrap());
    let policy = ConfirmationPolicy {
        poll_interval: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
        ..ConfirmationPolicy::default()
    };

    let orchestrator = ReleaseOrchestrator::new(
        ParameterBinder::new(config),
        DeploymentExecutor::new(chain.clone(), policy),
    )
    .with_verifier(explorer.clone())
    .with_project_dir(project.path());

    Pipeline {
        project,
        chain,
        explorer,
        orchestrator,
    }
}

#[tokio::test]
async fn test_jackpot_release_scenario() {
    let p = pipeline(goerli_config());

    let report = p
        .orchestrator
        .release("JackpotBlock", "goerli")
        .await
        .unwrap();

    let address = report.deployment.contract_address.unwrap();
    assert_ne!(address, Address::ZERO);
    assert_eq!(report.deployment.confirmation_state, ConfirmationState::Confirmed);
    assert_eq!(
        report.verification.as_ref().unwrap().status,
        VerificationStatus::Success
    );
    assert_eq!(
        report.arguments.cli_args(),
        [
            "0x98339D8C260052B7ad81c28c16C0b98420f2B46a",
            "1000000",
            "60",
            "5",
            "99",
            "0xDe75665F3BE46D696e5579628fA17b662e6fC04e",
            "1000",
        ]
    );

    // Verifying the same deployment again is idempotent.
    let again = p
        .orchestrator
        .verify("JackpotBlock", "goerli", address, report.arguments.clone())
        .await
        .unwrap();
    assert_eq!(again.status, VerificationStatus::AlreadyVerified);
    assert_eq!(p.chain.submissions(), 1);
}

#[tokio::test]
async fn test_address_is_create_address_of_signer_and_nonce() {
    let p = pipeline(goerli_config());

    let first = p.orchestrator.deploy("JackpotBlock", "goerli").await.unwrap();
    let second = p.orchestrator.deploy("JackpotBlock", "goerli").await.unwrap();

    let signer = p.orchestrator.binder().signer("goerli").unwrap();
    assert_eq!(first.deployment.contract_address, Some(signer.address().create(0)));
    assert_eq!(second.deployment.contract_address, Some(signer.address().create(1)));
    // No deduplication: two calls are two deployments.
    assert_eq!(p.chain.submissions(), 2);
}

#[tokio::test]
async fn test_missing_signer_makes_no_chain_calls() {
    let mut config = goerli_config();
    config.networks.get_mut("goerli").unwrap().private_key = None;
    let p = pipeline(config);

    let failure = p
        .orchestrator
        .release("JackpotBlock", "goerli")
        .await
        .unwrap_err();

    assert!(matches!(failure.error, ReleaseError::MissingParameter(ref param) if param.contains("private_key")));
    assert!(failure.deployment.is_none());
    assert_eq!(p.chain.calls(), 0);
    assert_eq!(p.explorer.submissions(), 0);
}

#[tokio::test]
async fn test_missing_constant_makes_no_chain_calls() {
    let mut config = goerli_config();
    config
        .networks
        .get_mut("goerli")
        .unwrap()
        .constants
        .remove("bet_fee");
    let p = pipeline(config);

    let failure = p
        .orchestrator
        .release("JackpotBlock", "goerli")
        .await
        .unwrap_err();

    assert!(matches!(failure.error, ReleaseError::MissingParameter(ref param) if param.contains("bet_fee")));
    assert_eq!(p.chain.calls(), 0);
}

#[tokio::test]
async fn test_failed_deployment_never_verifies() {
    let p = pipeline(goerli_config());
    p.chain.revert_next_creation();

    let failure = p
        .orchestrator
        .release("JackpotBlock", "goerli")
        .await
        .unwrap_err();

    assert!(matches!(failure.error, ReleaseError::DeploymentRejected { .. }));
    let partial = failure.deployment.unwrap();
    assert_eq!(partial.confirmation_state, ConfirmationState::Failed);
    assert!(partial.transaction_hash.is_some());
    assert_eq!(p.explorer.submissions(), 0);
}

#[tokio::test]
async fn test_mismatched_arguments_fail_verification() {
    let p = pipeline(goerli_config());

    let report = p.orchestrator.deploy("JackpotBlock", "goerli").await.unwrap();
    let address = report.deployment.contract_address.unwrap();

    let mut tampered: Vec<_> = report.arguments.iter().cloned().collect();
    tampered[6].value = ArgValue::Uint(U256::from(2000u64));

    let err = p
        .orchestrator
        .verify(
            "JackpotBlock",
            "goerli",
            address,
            ConstructorArgumentSet::new(tampered),
        )
        .await
        .unwrap_err();

    match err {
        ReleaseError::VerificationFailed(diagnostic) => {
            assert!(diagnostic.contains("do not match"))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_record_allows_later_verification() {
    let p = pipeline(goerli_config());

    let report = p.orchestrator.deploy("JackpotBlock", "goerli").await.unwrap();
    let record = DeploymentRecord::from_result(
        &report.contract,
        &report.network,
        &report.deployment,
        report.arguments.clone(),
    )
    .unwrap();
    let records = p.project.path().join("deployments");
    record
        .save_to_file(&DeploymentRecord::path(&records, "goerli", "JackpotBlock"))
        .unwrap();

    let loaded = DeploymentRecord::find(&records, "goerli", "JackpotBlock")
        .unwrap()
        .unwrap();
    let outcome = p
        .orchestrator
        .verify("JackpotBlock", "goerli", loaded.address, loaded.arguments)
        .await
        .unwrap();
    assert_eq!(outcome.status, VerificationStatus::Success);
}
