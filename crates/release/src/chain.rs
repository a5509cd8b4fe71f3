//! Chain client capability consumed by the deployment executor.

use std::future::Future;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{rpc::quantity, signer::SignerIdentity};

/// An unsigned contract-creation transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationTransaction {
    /// Creation bytecode followed by the ABI-encoded constructor arguments.
    pub data: Bytes,
    /// Gas limit. Estimated by the client when absent.
    pub gas_limit: Option<u64>,
    /// Gas price in wei. Queried by the client when absent.
    pub gas_price: Option<u128>,
}

/// A creation transaction accepted by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedCreation {
    pub tx_hash: B256,
    /// Nonce the transaction was signed with.
    pub nonce: u64,
}

/// Why a creation transaction could not be handed to the node.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Nothing is pending: the node answered with an error, or the
    /// transaction was never sent.
    #[error("{0:#}")]
    NotSubmitted(anyhow::Error),

    /// The signed transaction was sent but the reply was lost. The node may
    /// hold it, so it has to be watched like any submitted transaction.
    #[error("no reply to the submission of {tx_hash}: {error:#}")]
    Unacknowledged {
        tx_hash: B256,
        nonce: u64,
        error: anyhow::Error,
    },
}

/// Transaction receipt, as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default, with = "quantity::opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// `1` for success, `0` for a reverted transaction.
    #[serde(default, with = "quantity::opt")]
    pub status: Option<u64>,
    #[serde(default, with = "quantity::opt")]
    pub gas_used: Option<u64>,
}

impl TransactionReceipt {
    pub fn reverted(&self) -> bool {
        self.status == Some(0)
    }
}

/// Minimal chain access needed to deploy a contract.
///
/// Implementations own transport, nonce selection, gas pricing and signing;
/// the executor only submits and observes.
pub trait ChainClient: Send + Sync {
    /// Sign `tx` with `signer` and submit it.
    fn submit_creation(
        &self,
        tx: &CreationTransaction,
        signer: &SignerIdentity,
    ) -> impl Future<Output = Result<SubmittedCreation, SubmitError>> + Send;

    /// Fetch the receipt of a transaction, `None` while it is not yet included.
    fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>>> + Send;

    /// The latest block number.
    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_receipt() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x1b4",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1",
            "gasUsed": "0x2dc6c0",
            "logs": [],
        }))
        .unwrap();

        assert_eq!(receipt.block_number, Some(436));
        assert_eq!(receipt.status, Some(1));
        assert_eq!(receipt.gas_used, Some(3_000_000));
        assert!(!receipt.reverted());
        assert!(receipt.contract_address.is_some());
    }

    #[test]
    fn test_parse_reverted_receipt_without_address() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x10",
            "contractAddress": null,
            "status": "0x0",
        }))
        .unwrap();

        assert!(receipt.reverted());
        assert_eq!(receipt.contract_address, None);
        assert_eq!(receipt.gas_used, None);
    }
}
