//! In-process chain and explorer, used for dry runs and tests.
//!
//! [`SimulatedChain`] behaves like an automining dev node: a creation
//! transaction is included in a fresh block as soon as it is submitted, and
//! every `block_number` query produces one more block. [`SimulatedExplorer`]
//! accepts a verification only if the submitted bytecode and arguments
//! reproduce the creation data actually sent to the chain.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use alloy_core::primitives::{Address, B256, Bytes, keccak256};
use anyhow::Result;

use crate::{
    chain::{ChainClient, CreationTransaction, SubmitError, SubmittedCreation, TransactionReceipt},
    signer::SignerIdentity,
    verify::{VerificationOutcome, VerificationRequest, VerificationService},
};

/// Block height the simulated chain starts at.
const GENESIS_HEAD: u64 = 100;
/// Gas reported for every simulated creation.
const SIMULATED_GAS_USED: u64 = 1_250_000;

#[derive(Debug)]
struct ChainState {
    head: u64,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<B256, Option<TransactionReceipt>>,
    creation_data: HashMap<Address, Bytes>,
    submissions: usize,
    calls: usize,
    revert_next: bool,
    refusal: Option<String>,
    replies_lost: bool,
    stalled: bool,
    failing_polls: usize,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            head: GENESIS_HEAD,
            nonces: HashMap::new(),
            receipts: HashMap::new(),
            creation_data: HashMap::new(),
            submissions: 0,
            calls: 0,
            revert_next: false,
            refusal: None,
            replies_lost: false,
            stalled: false,
            failing_polls: 0,
        }
    }
}

/// A shared, in-memory chain. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SimulatedChain {
    state: Arc<Mutex<ChainState>>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `submit_creation` calls, refused ones included.
    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    /// Number of chain client calls of any kind.
    pub fn calls(&self) -> usize {
        self.state().calls
    }

    /// Current head, without producing a block.
    pub fn head(&self) -> u64 {
        self.state().head
    }

    /// Creation data of the contract deployed at `address`.
    pub fn creation_data(&self, address: Address) -> Option<Bytes> {
        self.state().creation_data.get(&address).cloned()
    }

    /// Make the next creation transaction revert on-chain.
    pub fn revert_next_creation(&self) {
        self.state().revert_next = true;
    }

    /// Refuse every submission with `reason`, as a node would for a bad nonce or low balance.
    pub fn refuse_submissions(&self, reason: &str) {
        self.state().refusal = Some(reason.to_string());
    }

    /// Accept transactions but fail to answer the submission, as a dropped
    /// connection would after the node has the transaction.
    pub fn lose_submission_replies(&self) {
        self.state().replies_lost = true;
    }

    /// Accept transactions but never include them.
    pub fn stall_inclusion(&self) {
        self.state().stalled = true;
    }

    /// Fail the next `count` receipt queries with a transport error.
    pub fn fail_next_receipt_polls(&self, count: usize) {
        self.state().failing_polls = count;
    }
}

impl ChainClient for SimulatedChain {
    async fn submit_creation(
        &self,
        tx: &CreationTransaction,
        signer: &SignerIdentity,
    ) -> Result<SubmittedCreation, SubmitError> {
        let mut state = self.state();
        state.calls += 1;
        state.submissions += 1;

        if let Some(reason) = &state.refusal {
            return Err(SubmitError::NotSubmitted(anyhow::anyhow!(
                "eth_sendRawTransaction rejected by node: {reason}"
            )));
        }

        let from = signer.address();
        let nonce = state.nonces.get(&from).copied().unwrap_or_default();
        state.nonces.insert(from, nonce + 1);

        let mut preimage = Vec::with_capacity(20 + 8 + tx.data.len());
        preimage.extend_from_slice(from.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&tx.data);
        let tx_hash = keccak256(&preimage);

        let submitted = if state.replies_lost {
            Err(SubmitError::Unacknowledged {
                tx_hash,
                nonce,
                error: anyhow::anyhow!("connection closed before message completed"),
            })
        } else {
            Ok(SubmittedCreation { tx_hash, nonce })
        };

        if state.stalled {
            state.receipts.insert(tx_hash, None);
            return submitted;
        }

        state.head += 1;
        let reverted = std::mem::take(&mut state.revert_next);
        let contract_address = (!reverted).then(|| from.create(nonce));
        if let Some(address) = contract_address {
            state.creation_data.insert(address, tx.data.clone());
        }

        let receipt = TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: Some(state.head),
            contract_address,
            status: Some(u64::from(!reverted)),
            gas_used: Some(SIMULATED_GAS_USED),
        };
        state.receipts.insert(tx_hash, Some(receipt));

        submitted
    }

    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let mut state = self.state();
        state.calls += 1;

        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            anyhow::bail!("connection reset by peer");
        }

        Ok(state.receipts.get(&tx_hash).cloned().flatten())
    }

    async fn block_number(&self) -> Result<u64> {
        let mut state = self.state();
        state.calls += 1;
        state.head += 1;
        Ok(state.head)
    }
}

#[derive(Debug, Default)]
struct ExplorerState {
    verified: HashSet<Address>,
    submissions: usize,
    unreachable: bool,
}

/// Explorer that checks submissions against a [`SimulatedChain`].
#[derive(Debug, Clone)]
pub struct SimulatedExplorer {
    chain: SimulatedChain,
    /// Creation bytecode of the contract being verified, without arguments.
    bytecode: Bytes,
    state: Arc<Mutex<ExplorerState>>,
}

impl SimulatedExplorer {
    pub fn new(chain: SimulatedChain, bytecode: Bytes) -> Self {
        Self {
            chain,
            bytecode,
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ExplorerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submissions(&self) -> usize {
        self.state().submissions
    }

    /// Fail every submission at the transport level.
    pub fn go_offline(&self) {
        self.state().unreachable = true;
    }
}

impl VerificationService for SimulatedExplorer {
    async fn submit(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        let mut state = self.state();
        state.submissions += 1;

        if state.unreachable {
            anyhow::bail!("explorer unreachable");
        }

        let address = request.contract_address;
        let Some(deployed) = self.chain.creation_data(address) else {
            return Ok(VerificationOutcome::failed(format!(
                "Unable to locate ContractCode at {address}"
            )));
        };

        let mut expected = self.bytecode.to_vec();
        expected.extend_from_slice(&request.arguments.abi_encode());
        if deployed.as_ref() != expected.as_slice() {
            return Ok(VerificationOutcome::failed(
                "Fail - Unable to verify. Compiled bytecode and constructor arguments do not match the deployed contract",
            ));
        }

        if !state.verified.insert(address) {
            return Ok(VerificationOutcome::already_verified("Already Verified"));
        }

        Ok(VerificationOutcome::success("Pass - Verified"))
    }
}
