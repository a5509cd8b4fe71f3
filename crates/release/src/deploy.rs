//! Deployment executor: submit a creation transaction and wait for confirmation.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};

use crate::{
    ReleaseError,
    chain::{ChainClient, CreationTransaction, SubmitError, SubmittedCreation, TransactionReceipt},
    config::DeployPolicy,
    params::ConstructorArgumentSet,
    signer::SignerIdentity,
};

/// Lifecycle of a creation transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfirmationState {
    /// Submitted, not yet observed at the required depth.
    Pending,
    /// Included at the required depth with a successful receipt.
    Confirmed,
    /// Refused by the node or reverted on-chain.
    Failed,
}

/// Everything needed to deploy one contract once.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub contract: String,
    /// Creation bytecode without constructor arguments.
    pub bytecode: Bytes,
    pub arguments: ConstructorArgumentSet,
    pub signer: SignerIdentity,
}

impl DeploymentRequest {
    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub fn creation_data(&self) -> Bytes {
        let encoded = self.arguments.abi_encode();
        let mut data = Vec::with_capacity(self.bytecode.len() + encoded.len());
        data.extend_from_slice(&self.bytecode);
        data.extend_from_slice(&encoded);
        Bytes::from(data)
    }
}

/// Outcome of a deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Address of the created contract, from the transaction receipt.
    pub contract_address: Option<Address>,
    pub transaction_hash: Option<B256>,
    pub confirmation_state: ConfirmationState,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

impl DeploymentResult {
    /// The partial result implied by a deployment error, if a transaction was sent.
    pub fn from_error(error: &ReleaseError) -> Option<Self> {
        match error {
            ReleaseError::DeploymentRejected {
                tx_hash: Some(tx_hash),
                ..
            } => Some(Self {
                contract_address: None,
                transaction_hash: Some(*tx_hash),
                confirmation_state: ConfirmationState::Failed,
                block_number: None,
            }),
            ReleaseError::DeploymentTimeout { tx_hash, .. } => Some(Self {
                contract_address: None,
                transaction_hash: Some(*tx_hash),
                confirmation_state: ConfirmationState::Pending,
                block_number: None,
            }),
            _ => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation_state == ConfirmationState::Confirmed
    }
}

/// How long and how deep to wait for a creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks required, counting the inclusion block.
    pub confirmations: u64,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

impl From<DeployPolicy> for ConfirmationPolicy {
    fn from(policy: DeployPolicy) -> Self {
        Self {
            confirmations: policy.confirmations.max(1),
            timeout: Duration::from_secs(policy.timeout_secs),
            poll_interval: Duration::from_millis(policy.poll_interval_ms),
            gas_limit: None,
            gas_price: None,
        }
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        DeployPolicy::default().into()
    }
}

/// Why a poll did not yield a confirmed receipt.
#[derive(Debug)]
enum PollError {
    NotIncluded,
    Shallow { depth: u64 },
    Rpc(anyhow::Error),
    Reverted(String),
}

impl PollError {
    fn keep_waiting(&self) -> bool {
        !matches!(self, PollError::Reverted(_))
    }
}

/// Submits creation transactions and waits for them to confirm.
///
/// A submitted transaction is never resubmitted: a rejection or a timeout is
/// returned to the caller, who decides whether to try again with a new request.
#[derive(Debug, Clone)]
pub struct DeploymentExecutor<C> {
    client: C,
    policy: ConfirmationPolicy,
}

impl<C: ChainClient> DeploymentExecutor<C> {
    pub fn new(client: C, policy: ConfirmationPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// Deploy and wait until the transaction is confirmed, rejected, or the timeout elapses.
    ///
    /// `Ok` always carries a [`ConfirmationState::Confirmed`] result.
    pub async fn deploy(&self, request: DeploymentRequest) -> Result<DeploymentResult, ReleaseError> {
        let tx = CreationTransaction {
            data: request.creation_data(),
            gas_limit: self.policy.gas_limit,
            gas_price: self.policy.gas_price,
        };

        tracing::info!(
            contract = %request.contract,
            from = %request.signer.address(),
            args = ?request.arguments.cli_args(),
            "Submitting creation transaction..."
        );

        let submitted = match self.client.submit_creation(&tx, &request.signer).await {
            Ok(submitted) => submitted,
            Err(SubmitError::NotSubmitted(e)) => {
                return Err(ReleaseError::DeploymentRejected {
                    tx_hash: None,
                    reason: format!("{e:#}"),
                });
            }
            // The node may hold the transaction: watch for it like any other.
            Err(SubmitError::Unacknowledged {
                tx_hash,
                nonce,
                error,
            }) => {
                tracing::warn!(
                    %tx_hash,
                    nonce,
                    error = %format!("{error:#}"),
                    "No reply to the creation transaction, watching for it anyway"
                );
                SubmittedCreation { tx_hash, nonce }
            }
        };

        let predicted = request.signer.address().create(submitted.nonce);
        tracing::info!(
            tx_hash = %submitted.tx_hash,
            nonce = submitted.nonce,
            predicted_address = %predicted,
            "Creation transaction submitted, waiting for confirmation..."
        );

        let receipt = self.wait_for_confirmation(submitted.tx_hash).await?;

        let contract_address =
            receipt
                .contract_address
                .ok_or_else(|| ReleaseError::DeploymentRejected {
                    tx_hash: Some(submitted.tx_hash),
                    reason: "receipt carries no contract address".to_string(),
                })?;

        if contract_address != predicted {
            tracing::warn!(
                %contract_address,
                %predicted,
                "Receipt address differs from the CREATE address of signer and nonce"
            );
        }

        tracing::info!(
            contract = %request.contract,
            %contract_address,
            block_number = ?receipt.block_number,
            "Deployment confirmed"
        );

        Ok(DeploymentResult {
            contract_address: Some(contract_address),
            transaction_hash: Some(submitted.tx_hash),
            confirmation_state: ConfirmationState::Confirmed,
            block_number: receipt.block_number,
        })
    }

    async fn wait_for_confirmation(&self, tx_hash: B256) -> Result<TransactionReceipt, ReleaseError> {
        let backoff = ConstantBuilder::default()
            .with_delay(self.policy.poll_interval)
            .with_max_times(usize::MAX);

        let poll = (|| self.observe(tx_hash))
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .when(PollError::keep_waiting)
            .notify(|err: &PollError, _| match err {
                PollError::Rpc(e) => {
                    tracing::debug!(error = %e, %tx_hash, "Receipt poll failed, retrying...")
                }
                other => tracing::trace!(state = ?other, %tx_hash, "Not confirmed yet"),
            });

        match tokio::time::timeout(self.policy.timeout, poll).await {
            Ok(Ok(receipt)) => Ok(receipt),
            Ok(Err(PollError::Reverted(reason))) => Err(ReleaseError::DeploymentRejected {
                tx_hash: Some(tx_hash),
                reason,
            }),
            // Only reachable if the retry budget runs out before the timeout.
            Ok(Err(_)) | Err(_) => Err(ReleaseError::DeploymentTimeout {
                tx_hash,
                waited: self.policy.timeout,
            }),
        }
    }

    async fn observe(&self, tx_hash: B256) -> Result<TransactionReceipt, PollError> {
        let receipt = self
            .client
            .transaction_receipt(tx_hash)
            .await
            .map_err(PollError::Rpc)?
            .ok_or(PollError::NotIncluded)?;

        if receipt.reverted() {
            return Err(PollError::Reverted(format!(
                "creation transaction reverted (gas used: {})",
                receipt
                    .gas_used
                    .map_or_else(|| "unknown".to_string(), |g| g.to_string())
            )));
        }

        let included = receipt.block_number.ok_or(PollError::NotIncluded)?;
        let head = self.client.block_number().await.map_err(PollError::Rpc)?;
        let depth = if head < included { 0 } else { head - included + 1 };

        if depth < self.policy.confirmations {
            return Err(PollError::Shallow { depth });
        }

        Ok(receipt)
    }
}
