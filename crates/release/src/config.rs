//! Release configuration.
//!
//! [`ReleaseConfig`] is the explicit configuration object handed to the
//! [`ParameterBinder`](crate::ParameterBinder). The library never reads the
//! process environment; the CLI assembles this struct from a TOML file and
//! environment overrides.

use std::{collections::BTreeMap, fmt, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// The default name for the release configuration file.
pub const CONFIG_FILENAME: &str = "Jackpot.toml";

/// Default number of blocks (inclusion block included) before a deployment is final.
pub const DEFAULT_CONFIRMATIONS: u64 = 1;
/// Default time to wait for confirmation before reporting a timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// A configuration value that must never be printed or written back to disk.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A literal configuration value, either a TOML integer or a string.
///
/// The distinction is kept all the way to verification: a price configured
/// as `"1000000"` is passed on as a numeric string, `60` as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(u64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Text(s) => f.write_str(s),
        }
    }
}

/// Solidity type of a constructor parameter.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ParamKind {
    Address,
    Uint256,
}

/// One declared constructor parameter.
///
/// The value comes either from a literal in the manifest (`value`) or from a
/// named constant of the target network profile (`constant`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name as it appears in the constructor signature.
    pub name: String,
    /// Solidity type of the parameter.
    pub kind: ParamKind,
    /// Key into the network profile's `constants` table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
    /// Literal value shared by every network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
}

impl ParamSpec {
    pub fn constant(name: &str, kind: ParamKind, key: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            constant: Some(key.to_string()),
            value: None,
        }
    }

    pub fn literal(name: &str, kind: ParamKind, value: Literal) -> Self {
        Self {
            name: name.to_string(),
            kind,
            constant: None,
            value: Some(value),
        }
    }
}

/// A deployable contract: where its compiled artifact lives and its constructor signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractManifest {
    /// Path to the hardhat artifact JSON holding the creation bytecode.
    pub artifact: PathBuf,
    /// Fully-qualified source name, e.g. `src/JackpotBlock.sol:JackpotBlock`.
    pub source: String,
    /// Constructor parameters, in signature order.
    #[serde(default)]
    pub constructor: Vec<ParamSpec>,
}

/// Verification backend for a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExplorerConfig {
    /// An Etherscan-compatible HTTP API.
    Etherscan {
        /// API endpoint, e.g. `https://api-goerli.etherscan.io/api`.
        api_url: Url,
        #[serde(default, skip_serializing)]
        api_key: Option<Secret>,
        /// Hardhat build-info JSON holding the standard-json compiler input.
        build_info: PathBuf,
        /// Overrides the compiler version read from the build-info file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        compiler_version: Option<String>,
    },
    /// The hardhat CLI (`npx hardhat verify`), run in `project_dir`.
    Hardhat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_dir: Option<PathBuf>,
        /// Network name as known to hardhat, if different from ours.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        network_alias: Option<String>,
    },
}

/// Per-network settings and constants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Expected chain ID. Checked against the node before signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Hex-encoded secp256k1 signing key.
    #[serde(default, skip_serializing)]
    pub private_key: Option<Secret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Fixed gas price. Queried from the node when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_wei: Option<u64>,
    /// Fixed gas limit. Estimated by the node when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Values referenced by `constant` constructor parameters.
    #[serde(default)]
    pub constants: BTreeMap<String, Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer: Option<ExplorerConfig>,
}

/// Confirmation policy shared by every network unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployPolicy {
    pub confirmations: u64,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for DeployPolicy {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

/// Complete release configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    #[serde(default)]
    pub deploy: DeployPolicy,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractManifest>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkProfile>,
}

impl ReleaseConfig {
    /// The deploy policy for a network, with its overrides applied.
    pub fn policy_for(&self, profile: &NetworkProfile) -> DeployPolicy {
        DeployPolicy {
            confirmations: profile.confirmations.unwrap_or(self.deploy.confirmations),
            timeout_secs: profile.timeout_secs.unwrap_or(self.deploy.timeout_secs),
            poll_interval_ms: self.deploy.poll_interval_ms,
        }
    }

    /// Save the configuration to a TOML file. Secrets are never written.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize release config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Jackpot.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file or directory not found: {}",
                path.display()
            );
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Starter configuration for the JackpotBlock lottery on goerli and gnosis.
    ///
    /// The gnosis profile deliberately carries no constants: binding against it
    /// fails until the operator fills them in.
    pub fn template() -> Self {
        let constructor = vec![
            ParamSpec::constant("_betTokenAddress", ParamKind::Address, "bet_token"),
            ParamSpec::constant("_betPrice", ParamKind::Uint256, "bet_price"),
            ParamSpec::literal(
                "_blocksBetweenRound",
                ParamKind::Uint256,
                Literal::Number(60),
            ),
            ParamSpec::literal(
                "_amountOfHashesToDetermineWinner",
                ParamKind::Uint256,
                Literal::Number(5),
            ),
            ParamSpec::literal("_maxBetValue", ParamKind::Uint256, Literal::Number(99)),
            ParamSpec::constant("_feeCollector", ParamKind::Address, "fee_collector"),
            ParamSpec::constant("_betFee", ParamKind::Uint256, "bet_fee"),
        ];

        let contracts = BTreeMap::from([(
            "JackpotBlock".to_string(),
            ContractManifest {
                artifact: PathBuf::from("artifacts/src/JackpotBlock.sol/JackpotBlock.json"),
                source: "src/JackpotBlock.sol:JackpotBlock".to_string(),
                constructor,
            },
        )]);

        let goerli_constants = BTreeMap::from([
            (
                "bet_token".to_string(),
                Literal::Text("0x98339D8C260052B7ad81c28c16C0b98420f2B46a".to_string()),
            ),
            (
                "bet_price".to_string(),
                Literal::Text("1000000".to_string()),
            ),
            (
                "fee_collector".to_string(),
                Literal::Text("0xDe75665F3BE46D696e5579628fA17b662e6fC04e".to_string()),
            ),
            ("bet_fee".to_string(), Literal::Number(1000)),
        ]);

        let networks = BTreeMap::from([
            (
                "goerli".to_string(),
                NetworkProfile {
                    chain_id: Some(5),
                    timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
                    constants: goerli_constants,
                    explorer: Some(ExplorerConfig::Hardhat {
                        project_dir: None,
                        network_alias: None,
                    }),
                    ..Default::default()
                },
            ),
            (
                "gnosis".to_string(),
                NetworkProfile {
                    chain_id: Some(100),
                    ..Default::default()
                },
            ),
        ]);

        Self {
            deploy: DeployPolicy::default(),
            contracts,
            networks,
        }
    }
}
