//! jackpot-release - Deploy and verify contracts, one network at a time.
//!
//! A release binds the constructor arguments a contract declares against a
//! network profile, deploys the contract through a [`ChainClient`], and
//! publishes its source through a [`VerificationService`] using the very
//! same arguments.

mod error;
pub use error::ReleaseError;

pub mod artifact;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod params;
pub mod record;
pub mod rpc;
pub mod signer;
pub mod sim;
pub mod verify;

#[cfg(test)]
mod http_stub;

mod release;
pub use release::{ReleaseFailure, ReleaseOrchestrator, ReleaseReport};

pub use artifact::ContractArtifact;
pub use chain::{ChainClient, SubmitError};
pub use config::{CONFIG_FILENAME, ExplorerConfig, NetworkProfile, ReleaseConfig, Secret};
pub use deploy::{
    ConfirmationPolicy, ConfirmationState, DeploymentExecutor, DeploymentRequest,
    DeploymentResult,
};
pub use params::{ArgValue, ConstructorArgumentSet, ParameterBinder};
pub use record::{DEFAULT_RECORDS_DIR, DeploymentRecord};
pub use rpc::RpcChainClient;
pub use signer::SignerIdentity;
pub use sim::{SimulatedChain, SimulatedExplorer};
pub use verify::{
    VerificationOutcome, VerificationRequest, VerificationService, VerificationStatus, Verifier,
};
