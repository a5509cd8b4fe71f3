//! Ethereum JSON-RPC transport for the chain client capability.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::{
    chain::{ChainClient, CreationTransaction, SubmitError, SubmittedCreation, TransactionReceipt},
    signer::{LegacyCreation, SignedTransaction, SignerIdentity},
};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Headroom added on top of `eth_estimateGas`, in percent.
const GAS_ESTIMATE_HEADROOM_PERCENT: u64 = 20;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// A JSON-RPC error object returned by the node.
#[derive(Debug, Error)]
#[error("{method} rejected by node: {message}")]
pub struct NodeRejection {
    pub method: String,
    pub message: String,
}

/// Make a JSON-RPC call and deserialize the result.
///
/// A JSON-RPC error object is returned as a [`NodeRejection`], which callers
/// can downcast to tell a refused request from a transport failure.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        return Err(NodeRejection {
            method: method.to_string(),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        }
        .into());
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Hex quantity helpers (`"0x1b4"`).
pub mod quantity {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn parse_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
        u64::from_str_radix(s.trim_start_matches("0x"), 16)
    }

    pub fn parse_u128(s: &str) -> Result<u128, std::num::ParseIntError> {
        u128::from_str_radix(s.trim_start_matches("0x"), 16)
    }

    pub fn format(n: u64) -> String {
        format!("0x{:x}", n)
    }

    /// Serde adapter for optional quantities.
    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(n) => s.serialize_some(&super::format(*n)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            Option::<String>::deserialize(d)?
                .map(|s| parse_u64(&s).map_err(D::Error::custom))
                .transpose()
        }
    }
}

/// [`ChainClient`] over an HTTP JSON-RPC endpoint.
///
/// Transactions are signed locally as EIP-155 legacy transactions and sent
/// with `eth_sendRawTransaction`; the node never sees the key.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    client: reqwest::Client,
    url: Url,
    expected_chain_id: Option<u64>,
}

impl RpcChainClient {
    /// Create a client. No request is made until the first call.
    pub fn new(url: Url, expected_chain_id: Option<u64>) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: create_client(DEFAULT_TIMEOUT)?,
            url,
            expected_chain_id,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.client, self.url.as_str(), method, params).await
    }

    /// The chain ID reported by the node, checked against the configured one.
    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let raw: String = self.call("eth_chainId", vec![]).await?;
        let chain_id = quantity::parse_u64(&raw).context("Invalid eth_chainId result")?;

        if let Some(expected) = self.expected_chain_id {
            if expected != chain_id {
                anyhow::bail!(
                    "RPC endpoint is on chain {} but the network is configured for chain {}",
                    chain_id,
                    expected
                );
            }
        }

        Ok(chain_id)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, anyhow::Error> {
        let raw: String = self
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("pending")],
            )
            .await?;
        quantity::parse_u64(&raw).context("Invalid eth_getTransactionCount result")
    }

    async fn gas_price(&self) -> Result<u128, anyhow::Error> {
        let raw: String = self.call("eth_gasPrice", vec![]).await?;
        quantity::parse_u128(&raw).context("Invalid eth_gasPrice result")
    }

    async fn estimate_gas(&self, from: Address, data: &Bytes) -> Result<u64, anyhow::Error> {
        let raw: String = self
            .call(
                "eth_estimateGas",
                vec![serde_json::json!({ "from": from, "data": data })],
            )
            .await?;
        let estimate = quantity::parse_u64(&raw).context("Invalid eth_estimateGas result")?;
        Ok(estimate + estimate * GAS_ESTIMATE_HEADROOM_PERCENT / 100)
    }

    /// Resolve chain ID, nonce and gas, then sign. Sends nothing.
    async fn sign_creation(
        &self,
        tx: &CreationTransaction,
        signer: &SignerIdentity,
    ) -> Result<(SignedTransaction, u64), anyhow::Error> {
        let chain_id = self.chain_id().await?;
        let nonce = self.pending_nonce(signer.address()).await?;

        let gas_price = match tx.gas_price {
            Some(price) => price,
            None => self.gas_price().await?,
        };
        let gas_limit = match tx.gas_limit {
            Some(limit) => limit,
            None => self
                .estimate_gas(signer.address(), &tx.data)
                .await
                .context("Gas estimation failed (constructor would revert?)")?,
        };

        tracing::debug!(
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            from = %signer.address(),
            "Signing creation transaction"
        );

        let signed = signer.sign_creation(&LegacyCreation {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            data: tx.data.clone(),
        })?;

        Ok((signed, nonce))
    }
}

impl ChainClient for RpcChainClient {
    async fn submit_creation(
        &self,
        tx: &CreationTransaction,
        signer: &SignerIdentity,
    ) -> Result<SubmittedCreation, SubmitError> {
        let (signed, nonce) = self
            .sign_creation(tx, signer)
            .await
            .map_err(SubmitError::NotSubmitted)?;

        let sent: Result<B256, _> = self
            .call("eth_sendRawTransaction", vec![serde_json::json!(signed.raw)])
            .await;

        let error = match sent {
            Ok(tx_hash) => return Ok(SubmittedCreation { tx_hash, nonce }),
            Err(error) => error,
        };

        let already_known = error
            .downcast_ref::<NodeRejection>()
            .map(|rejection| rejection.message.contains("already known"));

        match already_known {
            // The node already has this exact transaction in its pool.
            Some(true) => {
                tracing::warn!(tx_hash = %signed.hash, "Transaction already known to the node");
                Ok(SubmittedCreation {
                    tx_hash: signed.hash,
                    nonce,
                })
            }
            Some(false) => Err(SubmitError::NotSubmitted(error)),
            None => Err(SubmitError::Unacknowledged {
                tx_hash: signed.hash,
                nonce,
                error,
            }),
        }
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<TransactionReceipt>, anyhow::Error> {
        self.call(
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await
    }

    async fn block_number(&self) -> Result<u64, anyhow::Error> {
        let raw: String = self.call("eth_blockNumber", vec![]).await?;
        quantity::parse_u64(&raw).context("Invalid eth_blockNumber result")
    }
}
