//! Release orchestrator: bind, deploy, then verify one contract on one network.

use std::path::PathBuf;

use alloy_core::primitives::Address;
use serde::Serialize;
use thiserror::Error;

use crate::{
    ReleaseError,
    artifact::ContractArtifact,
    chain::ChainClient,
    deploy::{DeploymentExecutor, DeploymentRequest, DeploymentResult},
    params::{ConstructorArgumentSet, ParameterBinder},
    verify::{VerificationOutcome, VerificationRequest, VerificationService, VerificationSubmitter},
};

/// Everything known about a successful release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    pub network: String,
    pub contract: String,
    pub arguments: ConstructorArgumentSet,
    pub deployment: DeploymentResult,
    /// `None` when the deployment was not followed by verification.
    pub verification: Option<VerificationOutcome>,
}

/// A release that stopped early.
///
/// `deployment` is set whenever a transaction was sent, so a confirmed
/// deployment is still reported when only verification failed.
#[derive(Debug, Error)]
#[error("release of {contract} on {network} failed")]
pub struct ReleaseFailure {
    pub network: String,
    pub contract: String,
    pub arguments: Option<ConstructorArgumentSet>,
    pub deployment: Option<DeploymentResult>,
    #[source]
    pub error: ReleaseError,
}

impl ReleaseFailure {
    fn pre_flight(contract: &str, network: &str, error: ReleaseError) -> Self {
        Self {
            network: network.to_string(),
            contract: contract.to_string(),
            arguments: None,
            deployment: None,
            error,
        }
    }
}

/// Runs releases against the chain behind one [`DeploymentExecutor`].
///
/// The executor's chain client must point at the network passed to
/// [`ReleaseOrchestrator::release`]; build one orchestrator per network.
#[derive(Debug)]
pub struct ReleaseOrchestrator<C, V> {
    binder: ParameterBinder,
    executor: DeploymentExecutor<C>,
    submitter: Option<VerificationSubmitter<V>>,
    /// Base for relative artifact paths.
    project_dir: PathBuf,
}

impl<C: ChainClient, V: VerificationService> ReleaseOrchestrator<C, V> {
    pub fn new(binder: ParameterBinder, executor: DeploymentExecutor<C>) -> Self {
        Self {
            binder,
            executor,
            submitter: None,
            project_dir: PathBuf::from("."),
        }
    }

    pub fn with_verifier(mut self, service: V) -> Self {
        self.submitter = Some(VerificationSubmitter::new(service));
        self
    }

    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = project_dir.into();
        self
    }

    pub fn binder(&self) -> &ParameterBinder {
        &self.binder
    }

    pub fn executor(&self) -> &DeploymentExecutor<C> {
        &self.executor
    }

    /// Bind arguments, load the signer and the artifact. No network calls.
    pub fn prepare(&self, contract: &str, network: &str) -> Result<DeploymentRequest, ReleaseError> {
        let arguments = self.binder.bind(contract, network)?;
        let signer = self.binder.signer(network)?;
        let artifact = self.load_artifact(contract)?;

        Ok(DeploymentRequest {
            contract: contract.to_string(),
            bytecode: artifact.bytecode,
            arguments,
            signer,
        })
    }

    /// Load the compiled artifact declared for `contract`.
    pub fn load_artifact(&self, contract: &str) -> Result<ContractArtifact, ReleaseError> {
        let manifest = self.binder.contract(contract)?;
        let path = self.project_dir.join(&manifest.artifact);

        ContractArtifact::load_from_file(&path).map_err(|e| {
            ReleaseError::invalid(format!("contracts.{contract}.artifact"), format!("{e:#}"))
        })
    }

    /// Bind and deploy, without verification.
    pub async fn deploy(&self, contract: &str, network: &str) -> Result<ReleaseReport, ReleaseFailure> {
        let request = self
            .prepare(contract, network)
            .map_err(|e| ReleaseFailure::pre_flight(contract, network, e))?;
        let arguments = request.arguments.clone();

        tracing::info!(contract, network, "Starting deployment");

        match self.executor.deploy(request).await {
            Ok(deployment) => Ok(ReleaseReport {
                network: network.to_string(),
                contract: contract.to_string(),
                arguments,
                deployment,
                verification: None,
            }),
            Err(error) => Err(ReleaseFailure {
                network: network.to_string(),
                contract: contract.to_string(),
                arguments: Some(arguments),
                deployment: DeploymentResult::from_error(&error),
                error,
            }),
        }
    }

    /// Bind, deploy and verify.
    ///
    /// Verification only runs after a confirmed deployment. Every call makes
    /// a new deployment.
    pub async fn release(&self, contract: &str, network: &str) -> Result<ReleaseReport, ReleaseFailure> {
        let (submitter, source) = self
            .verification_target(contract, network)
            .map_err(|e| ReleaseFailure::pre_flight(contract, network, e))?;

        let mut report = self.deploy(contract, network).await?;

        let Some(request) = VerificationRequest::for_deployment(
            &report.deployment,
            network,
            &source,
            report.arguments.clone(),
        ) else {
            return Err(ReleaseFailure {
                network: report.network,
                contract: report.contract,
                arguments: Some(report.arguments),
                error: ReleaseError::DeploymentRejected {
                    tx_hash: report.deployment.transaction_hash,
                    reason: "confirmed deployment carries no contract address".to_string(),
                },
                deployment: Some(report.deployment),
            });
        };

        let outcome = submitter.verify(&request).await;
        if !outcome.is_verified() {
            return Err(ReleaseFailure {
                network: report.network,
                contract: report.contract,
                arguments: Some(report.arguments),
                deployment: Some(report.deployment),
                error: ReleaseError::VerificationFailed(outcome.diagnostic),
            });
        }

        tracing::info!(
            contract,
            network,
            address = ?report.deployment.contract_address,
            status = %outcome.status,
            "Release complete"
        );

        report.verification = Some(outcome);
        Ok(report)
    }

    /// Verify an already deployed contract with the arguments it was created with.
    pub async fn verify(
        &self,
        contract: &str,
        network: &str,
        address: Address,
        arguments: ConstructorArgumentSet,
    ) -> Result<VerificationOutcome, ReleaseError> {
        let (submitter, source) = self.verification_target(contract, network)?;

        let outcome = submitter
            .verify(&VerificationRequest {
                contract_address: address,
                network: network.to_string(),
                contract: source,
                arguments,
            })
            .await;

        if outcome.is_verified() {
            Ok(outcome)
        } else {
            Err(ReleaseError::VerificationFailed(outcome.diagnostic))
        }
    }

    fn verification_target(
        &self,
        contract: &str,
        network: &str,
    ) -> Result<(&VerificationSubmitter<V>, String), ReleaseError> {
        let submitter = self.submitter.as_ref().ok_or_else(|| {
            ReleaseError::MissingParameter(format!("networks.{network}.explorer"))
        })?;
        let source = self.binder.contract(contract)?.source.clone();
        Ok((submitter, source))
    }
}
