//! Verification submitter: publish a deployed contract's source on a block explorer.

mod etherscan;
mod hardhat;

use std::future::Future;

use alloy_core::primitives::Address;
use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use etherscan::{EtherscanVerifier, classify_etherscan_result};
pub use hardhat::{HardhatVerifier, classify_hardhat_output};

use crate::{
    ReleaseError, config::ExplorerConfig, deploy::DeploymentResult,
    params::ConstructorArgumentSet,
};

/// Terminal status of a verification submission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    Success,
    /// The explorer already holds the source. Treated like `Success`.
    AlreadyVerified,
    /// Rejected; the diagnostic says why. Transient and permanent causes alike.
    Failed,
}

/// Classified response of a verification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    pub diagnostic: String,
}

impl VerificationOutcome {
    pub fn success(diagnostic: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Success,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn already_verified(diagnostic: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::AlreadyVerified,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Failed,
            diagnostic: diagnostic.into(),
        }
    }

    /// `Success` or `AlreadyVerified`.
    pub fn is_verified(&self) -> bool {
        self.status != VerificationStatus::Failed
    }
}

/// What to verify: a deployed address and the arguments it was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub contract_address: Address,
    pub network: String,
    /// Fully-qualified source name, e.g. `src/JackpotBlock.sol:JackpotBlock`.
    pub contract: String,
    pub arguments: ConstructorArgumentSet,
}

impl VerificationRequest {
    /// Derive the request for a deployment. `None` if no contract address was produced.
    pub fn for_deployment(
        deployment: &DeploymentResult,
        network: &str,
        contract: &str,
        arguments: ConstructorArgumentSet,
    ) -> Option<Self> {
        Some(Self {
            contract_address: deployment.contract_address?,
            network: network.to_string(),
            contract: contract.to_string(),
            arguments,
        })
    }
}

/// A backend able to check submitted source against deployed bytecode.
pub trait VerificationService: Send + Sync {
    /// Submit `request` and wait for the explorer's verdict.
    ///
    /// An error means the service could not be reached or answered
    /// unintelligibly; an explicit rejection is an `Ok` with `Failed` status.
    fn submit(
        &self,
        request: &VerificationRequest,
    ) -> impl Future<Output = Result<VerificationOutcome>> + Send;
}

/// The verification backend selected by a network's explorer configuration.
#[derive(Debug, Clone)]
pub enum Verifier {
    Etherscan(EtherscanVerifier),
    Hardhat(HardhatVerifier),
}

impl Verifier {
    /// Build the backend configured for `network`.
    pub fn from_config(
        network: &str,
        explorer: Option<&ExplorerConfig>,
    ) -> Result<Self, ReleaseError> {
        match explorer {
            None => Err(ReleaseError::MissingParameter(format!(
                "networks.{network}.explorer"
            ))),
            Some(ExplorerConfig::Etherscan {
                api_url,
                api_key,
                build_info,
                compiler_version,
            }) => {
                let api_key = api_key
                    .as_ref()
                    .filter(|key| !key.is_empty())
                    .ok_or_else(|| {
                        ReleaseError::MissingParameter(format!(
                            "networks.{network}.explorer.api_key"
                        ))
                    })?;
                let verifier = EtherscanVerifier::new(
                    api_url.clone(),
                    api_key.clone(),
                    build_info.clone(),
                    compiler_version.clone(),
                )
                .map_err(|e| ReleaseError::invalid(format!("networks.{network}.explorer"), e.to_string()))?;
                Ok(Self::Etherscan(verifier))
            }
            Some(ExplorerConfig::Hardhat {
                project_dir,
                network_alias,
            }) => Ok(Self::Hardhat(HardhatVerifier::new(
                project_dir.clone(),
                network_alias.clone(),
            ))),
        }
    }
}

impl VerificationService for Verifier {
    async fn submit(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        match self {
            Verifier::Etherscan(verifier) => verifier.submit(request).await,
            Verifier::Hardhat(verifier) => verifier.submit(request).await,
        }
    }
}

/// Submits verification requests and classifies the result.
///
/// There is no retry here: a `Failed` outcome goes back to the caller, who
/// decides from the diagnostic whether another attempt makes sense.
#[derive(Debug, Clone)]
pub struct VerificationSubmitter<V> {
    service: V,
}

impl<V: VerificationService> VerificationSubmitter<V> {
    pub fn new(service: V) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &V {
        &self.service
    }

    pub async fn verify(&self, request: &VerificationRequest) -> VerificationOutcome {
        tracing::info!(
            address = %request.contract_address,
            network = %request.network,
            contract = %request.contract,
            args = ?request.arguments.cli_args(),
            "Submitting source for verification..."
        );

        let outcome = match self.service.submit(request).await {
            Ok(outcome) => outcome,
            Err(e) => VerificationOutcome::failed(format!("{e:#}")),
        };

        match outcome.status {
            VerificationStatus::Failed => tracing::warn!(
                address = %request.contract_address,
                diagnostic = %outcome.diagnostic,
                "Verification failed"
            ),
            status => tracing::info!(
                address = %request.contract_address,
                %status,
                "Verification complete"
            ),
        }

        outcome
    }
}
