//! Error taxonomy for the release pipeline.

use std::time::Duration;

use alloy_core::primitives::B256;
use thiserror::Error;

/// Errors surfaced by the release pipeline stages.
///
/// Each variant tells the caller what is known about on-chain state:
/// pre-flight errors guarantee nothing was submitted, `DeploymentTimeout`
/// means the transaction may still land.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// A required configuration value is absent. Raised before any network call.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// A configured value does not match its declared type. Raised before any network call.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The creation transaction was refused by the node or reverted on-chain.
    #[error("deployment rejected: {reason}")]
    DeploymentRejected {
        /// Hash of the rejected transaction, when the node accepted it first.
        tx_hash: Option<B256>,
        reason: String,
    },

    /// Confirmation was not observed in time. The transaction may still be mined.
    ///
    /// Also raised when the reply to the submission was lost and the
    /// transaction never showed up afterwards.
    #[error("deployment of {tx_hash} not confirmed after {waited:?}")]
    DeploymentTimeout { tx_hash: B256, waited: Duration },

    /// The explorer refused the verification submission.
    #[error("verification failed: {0}")]
    VerificationFailed(String),
}

impl ReleaseError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error was raised before anything was sent to the chain.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_) | Self::InvalidParameter { .. }
        )
    }

    /// Whether the on-chain outcome is unknown and must be checked before retrying.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::DeploymentTimeout { .. })
    }
}
