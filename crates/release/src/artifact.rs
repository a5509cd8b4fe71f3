//! Compiled contract artifacts.

use std::path::Path;

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// The parts of a hardhat artifact (`artifacts/<source>/<Name>.json`) needed to deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    bytecode: String,
}

impl ContractArtifact {
    /// Load an artifact from a hardhat artifact JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid artifact {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: HardhatArtifact =
            serde_json::from_str(content).context("Failed to parse artifact JSON")?;

        let code = artifact.bytecode.trim_start_matches("0x");
        if code.is_empty() {
            anyhow::bail!(
                "{} has no creation bytecode (abstract contract or interface?)",
                artifact.contract_name
            );
        }
        if code.contains("__") {
            anyhow::bail!(
                "{} has unlinked library placeholders in its bytecode",
                artifact.contract_name
            );
        }

        let bytecode = hex::decode(code).context("Artifact bytecode is not valid hex")?;

        Ok(Self {
            contract_name: artifact.contract_name,
            source_name: artifact.source_name,
            bytecode: Bytes::from(bytecode),
        })
    }
}
