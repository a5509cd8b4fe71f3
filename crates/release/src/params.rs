//! Constructor-argument binding.
//!
//! The [`ParameterBinder`] resolves a contract's declared constructor
//! parameters against a network profile and produces an immutable
//! [`ConstructorArgumentSet`]. Binding is pure: it never touches the network,
//! and it fails fast on any absent value instead of substituting a default.

use std::{fmt, str::FromStr};

use alloy_core::primitives::{Address, Bytes, U256};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

use crate::{
    ReleaseError,
    config::{ContractManifest, Literal, NetworkProfile, ParamKind, ParamSpec, ReleaseConfig},
    signer::SignerIdentity,
};

/// A bound constructor value.
///
/// `Uint` and `NumericString` encode identically on-chain but are rendered
/// differently for verification backends that take positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    NumericString(DecimalString),
}

impl ArgValue {
    /// The 32-byte ABI word for this value.
    pub fn abi_word(&self) -> [u8; 32] {
        match self {
            ArgValue::Address(address) => address.into_word().0,
            ArgValue::Uint(value) => value.to_be_bytes::<32>(),
            ArgValue::NumericString(decimal) => decimal.value().to_be_bytes::<32>(),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Address(address) => write!(f, "{}", address.to_checksum(None)),
            ArgValue::Uint(value) => write!(f, "{value}"),
            ArgValue::NumericString(decimal) => f.write_str(decimal.as_str()),
        }
    }
}

/// A uint256 supplied as a decimal string, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DecimalString {
    text: String,
    value: U256,
}

impl DecimalString {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> U256 {
        self.value
    }
}

impl FromStr for DecimalString {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("expected a decimal number, got `{text}`"));
        }
        let value =
            U256::from_str_radix(text, 10).map_err(|e| format!("out of range: {e}"))?;
        Ok(Self {
            text: text.to_string(),
            value,
        })
    }
}

impl TryFrom<String> for DecimalString {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        text.parse()
    }
}

impl From<DecimalString> for String {
    fn from(decimal: DecimalString) -> Self {
        decimal.text
    }
}

/// A named, bound constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorArg {
    pub name: String,
    pub value: ArgValue,
}

/// Ordered constructor arguments for one release.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Deref)]
#[serde(transparent)]
pub struct ConstructorArgumentSet(Vec<ConstructorArg>);

impl ConstructorArgumentSet {
    pub fn new(args: Vec<ConstructorArg>) -> Self {
        Self(args)
    }

    /// ABI-encode the arguments as appended to creation bytecode.
    ///
    /// Every supported parameter type is static, so the encoding is the
    /// concatenation of one word per argument.
    pub fn abi_encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.0.len() * 32);
        for arg in &self.0 {
            out.extend_from_slice(&arg.value.abi_word());
        }
        Bytes::from(out)
    }

    /// Arguments rendered exactly as supplied, in constructor order.
    pub fn cli_args(&self) -> Vec<String> {
        self.0.iter().map(|arg| arg.value.to_string()).collect()
    }
}

impl FromIterator<ConstructorArg> for ConstructorArgumentSet {
    fn from_iter<I: IntoIterator<Item = ConstructorArg>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolves constructor arguments and signer credentials from a [`ReleaseConfig`].
#[derive(Debug, Clone)]
pub struct ParameterBinder {
    config: ReleaseConfig,
}

impl ParameterBinder {
    pub fn new(config: ReleaseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReleaseConfig {
        &self.config
    }

    /// Look up a network profile.
    pub fn network(&self, network: &str) -> Result<&NetworkProfile, ReleaseError> {
        self.config
            .networks
            .get(network)
            .ok_or_else(|| ReleaseError::MissingParameter(format!("networks.{network}")))
    }

    /// Look up a contract manifest.
    pub fn contract(&self, contract: &str) -> Result<&ContractManifest, ReleaseError> {
        self.config
            .contracts
            .get(contract)
            .ok_or_else(|| ReleaseError::MissingParameter(format!("contracts.{contract}")))
    }

    /// Bind the constructor arguments of `contract` for `network`.
    ///
    /// Also checks that the network has everything a deployment needs (RPC
    /// URL and signer credential), so an incomplete profile is rejected here
    /// rather than after a chain client has been contacted.
    pub fn bind(
        &self,
        contract: &str,
        network: &str,
    ) -> Result<ConstructorArgumentSet, ReleaseError> {
        let profile = self.network(network)?;

        if profile.rpc_url.is_none() {
            return Err(ReleaseError::MissingParameter(format!(
                "networks.{network}.rpc_url"
            )));
        }
        if profile.private_key.as_ref().is_none_or(|key| key.is_empty()) {
            return Err(ReleaseError::MissingParameter(format!(
                "networks.{network}.private_key"
            )));
        }

        self.bind_arguments(contract, network)
    }

    /// Bind the constructor arguments alone, for verifying an existing deployment.
    pub fn bind_arguments(
        &self,
        contract: &str,
        network: &str,
    ) -> Result<ConstructorArgumentSet, ReleaseError> {
        let profile = self.network(network)?;
        let manifest = self.contract(contract)?;
        let args = manifest
            .constructor
            .iter()
            .map(|spec| bind_param(spec, profile, network))
            .collect::<Result<ConstructorArgumentSet, _>>()?;

        tracing::debug!(
            contract,
            network,
            args = ?args.cli_args(),
            "Bound constructor arguments"
        );

        Ok(args)
    }

    /// Load the signing identity configured for `network`.
    pub fn signer(&self, network: &str) -> Result<SignerIdentity, ReleaseError> {
        let key = self
            .network(network)?
            .private_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ReleaseError::MissingParameter(format!("networks.{network}.private_key"))
            })?;

        SignerIdentity::from_hex(key.expose()).map_err(|e| {
            ReleaseError::invalid(format!("networks.{network}.private_key"), e.to_string())
        })
    }
}

fn bind_param(
    spec: &ParamSpec,
    profile: &NetworkProfile,
    network: &str,
) -> Result<ConstructorArg, ReleaseError> {
    let raw = match (&spec.value, &spec.constant) {
        (Some(literal), None) => literal,
        (None, Some(key)) => profile.constants.get(key).ok_or_else(|| {
            ReleaseError::MissingParameter(format!(
                "networks.{network}.constants.{key} (for `{}`)",
                spec.name
            ))
        })?,
        (Some(_), Some(_)) => {
            return Err(ReleaseError::invalid(
                &spec.name,
                "declares both a literal value and a network constant",
            ));
        }
        (None, None) => {
            return Err(ReleaseError::MissingParameter(format!(
                "value for constructor parameter `{}`",
                spec.name
            )));
        }
    };

    let value = parse_value(&spec.name, spec.kind, raw)?;
    Ok(ConstructorArg {
        name: spec.name.clone(),
        value,
    })
}

fn parse_value(name: &str, kind: ParamKind, raw: &Literal) -> Result<ArgValue, ReleaseError> {
    if let Literal::Text(text) = raw {
        if text.trim().is_empty() {
            return Err(ReleaseError::MissingParameter(format!(
                "value for constructor parameter `{name}` is empty"
            )));
        }
    }

    match (kind, raw) {
        (ParamKind::Address, Literal::Text(text)) => {
            let address = Address::from_str(text.trim())
                .map_err(|e| ReleaseError::invalid(name, format!("not an address: {e}")))?;
            if address.is_zero() {
                return Err(ReleaseError::invalid(name, "zero address"));
            }
            Ok(ArgValue::Address(address))
        }
        (ParamKind::Address, Literal::Number(_)) => {
            Err(ReleaseError::invalid(name, format!("expected {kind}, got a number")))
        }
        (ParamKind::Uint256, Literal::Number(n)) => Ok(ArgValue::Uint(U256::from(*n))),
        (ParamKind::Uint256, Literal::Text(text)) => text
            .parse()
            .map(ArgValue::NumericString)
            .map_err(|reason| ReleaseError::invalid(name, reason)),
    }
}
