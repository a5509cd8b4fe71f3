//! Deployment records: what was deployed where, with which arguments.
//!
//! A record is written to `<records>/<network>/<contract>.json` after a
//! confirmed deployment. It lets `verify` run later without re-binding, and
//! guards against deploying the same contract twice by accident.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{deploy::DeploymentResult, params::ConstructorArgumentSet};

/// Default directory for deployment records, relative to the project.
pub const DEFAULT_RECORDS_DIR: &str = "deployments";

/// A confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub contract: String,
    pub network: String,
    pub address: Address,
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    /// Arguments the contract was created with, as bound at deploy time.
    pub arguments: ConstructorArgumentSet,
    /// Unix timestamp of the confirmation.
    pub deployed_at: i64,
    /// Version of the tool that made the deployment.
    pub tool_version: String,
}

impl DeploymentRecord {
    /// Build a record from a confirmed deployment. `None` if it is not confirmed.
    pub fn from_result(
        contract: &str,
        network: &str,
        result: &DeploymentResult,
        arguments: ConstructorArgumentSet,
    ) -> Option<Self> {
        if !result.is_confirmed() {
            return None;
        }

        Some(Self {
            contract: contract.to_string(),
            network: network.to_string(),
            address: result.contract_address?,
            transaction_hash: result.transaction_hash?,
            block_number: result.block_number,
            arguments,
            deployed_at: chrono::Utc::now().timestamp(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Location of the record for `contract` on `network` under `dir`.
    pub fn path(dir: &Path, network: &str, contract: &str) -> PathBuf {
        dir.join(network).join(format!("{contract}.json"))
    }

    /// Write the record as pretty JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create records directory {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;

        std::fs::write(path, json).with_context(|| {
            format!("Failed to write deployment record to {}", path.display())
        })?;

        tracing::debug!(path = %path.display(), address = %self.address, "Deployment record saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path).with_context(|| {
            format!("Failed to read deployment record from {}", path.display())
        })?;

        serde_json::from_str(&content).context("Failed to parse deployment record JSON")
    }

    /// Load the record if one exists.
    pub fn find(dir: &Path, network: &str, contract: &str) -> Result<Option<Self>> {
        let path = Self::path(dir, network, contract);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_file(&path).map(Some)
    }
}
