//! Chain-facing types and the traits the pipeline talks to.
//!
//! [`ChainReader`] covers the read-only node surface (class lookup, status and
//! receipt polling, event pages). [`ChainWriter`] adds the signing account used to
//! submit declare and deploy transactions. Wire types come from `starknet`; this
//! module only narrows them to what the pipeline inspects.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use starknet::{
    core::types::{self as node, Felt, StarknetError},
    providers::ProviderError,
};

pub use starknet::core::types::{BlockId, BlockTag, EmittedEvent, Event, EventFilter, EventsPage};

use crate::ContractArtifact;

/// Errors raised while talking to the network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("transaction submission failed: {0}")]
    Submission(String),

    #[error("transaction {tx_hash:#x} failed with status {status}: {reason}")]
    TransactionFailed {
        tx_hash: Felt,
        status: TxState,
        reason: String,
    },

    #[error("timed out after {elapsed_secs}s waiting for transaction {tx_hash:#x}")]
    Timeout { tx_hash: Felt, elapsed_secs: u64 },

    #[error("receipt of {tx_hash:#x} carries no deployment event")]
    MissingDeployment { tx_hash: Felt },
}

impl NetworkError {
    /// Whether the node explicitly reported the class hash as unknown.
    pub fn is_class_not_found(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::StarknetError(StarknetError::ClassHashNotFound))
        )
    }

    /// Whether the node does not (yet) know the transaction.
    pub fn is_tx_not_found(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::StarknetError(
                StarknetError::TransactionHashNotFound
            ))
        )
    }
}

/// Answer of a class-by-hash query that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassLookup {
    Declared,
    NotDeclared,
}

/// Finality and execution states a transaction goes through.
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
    strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TxState {
    Received,
    Rejected,
    AcceptedOnL2,
    AcceptedOnL1,
    Succeeded,
    Reverted,
}

impl TxState {
    /// States after which the transaction will never be accepted.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Reverted)
    }
}

impl From<&node::TransactionFinalityStatus> for TxState {
    fn from(status: &node::TransactionFinalityStatus) -> Self {
        match status {
            node::TransactionFinalityStatus::AcceptedOnL2 => Self::AcceptedOnL2,
            node::TransactionFinalityStatus::AcceptedOnL1 => Self::AcceptedOnL1,
        }
    }
}

impl From<&node::TransactionExecutionStatus> for TxState {
    fn from(status: &node::TransactionExecutionStatus) -> Self {
        match status {
            node::TransactionExecutionStatus::Succeeded => Self::Succeeded,
            node::TransactionExecutionStatus::Reverted => Self::Reverted,
        }
    }
}

/// Where a transaction stands, as seen by a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub finality_status: TxState,
    pub execution_status: Option<TxState>,
}

impl TransactionStatus {
    /// The finality state followed by the execution state, if known.
    pub fn states(&self) -> impl Iterator<Item = TxState> + '_ {
        std::iter::once(self.finality_status).chain(self.execution_status)
    }
}

impl From<&node::TransactionStatus> for TransactionStatus {
    fn from(status: &node::TransactionStatus) -> Self {
        let (finality_status, execution_status) = match status {
            node::TransactionStatus::Received => (TxState::Received, None),
            node::TransactionStatus::Rejected => (TxState::Rejected, None),
            node::TransactionStatus::AcceptedOnL2(execution) => {
                (TxState::AcceptedOnL2, Some(execution.into()))
            }
            node::TransactionStatus::AcceptedOnL1(execution) => {
                (TxState::AcceptedOnL1, Some(execution.into()))
            }
        };
        Self {
            finality_status,
            execution_status,
        }
    }
}

/// The part of a transaction receipt the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: Felt,
    pub finality_status: TxState,
    pub execution_status: TxState,
    pub revert_reason: Option<String>,
    pub events: Vec<Event>,
}

impl From<node::TransactionReceipt> for TransactionReceipt {
    fn from(receipt: node::TransactionReceipt) -> Self {
        let (transaction_hash, finality_status, execution_result, events) = match receipt {
            node::TransactionReceipt::Invoke(r) => {
                (r.transaction_hash, r.finality_status, r.execution_result, r.events)
            }
            node::TransactionReceipt::L1Handler(r) => {
                (r.transaction_hash, r.finality_status, r.execution_result, r.events)
            }
            node::TransactionReceipt::Declare(r) => {
                (r.transaction_hash, r.finality_status, r.execution_result, r.events)
            }
            node::TransactionReceipt::Deploy(r) => {
                (r.transaction_hash, r.finality_status, r.execution_result, r.events)
            }
            node::TransactionReceipt::DeployAccount(r) => {
                (r.transaction_hash, r.finality_status, r.execution_result, r.events)
            }
        };
        let (execution_status, revert_reason) = match execution_result {
            node::ExecutionResult::Succeeded => (TxState::Succeeded, None),
            node::ExecutionResult::Reverted { reason } => (TxState::Reverted, Some(reason)),
        };

        Self {
            transaction_hash,
            finality_status: (&finality_status).into(),
            execution_status,
            revert_reason,
            events,
        }
    }
}

/// Parse a block identifier: `latest`, `pending`, a `0x` hash or a block number.
pub fn parse_block_id(s: &str) -> Result<BlockId, String> {
    match s {
        "latest" => Ok(BlockId::Tag(BlockTag::Latest)),
        "pending" => Ok(BlockId::Tag(BlockTag::Pending)),
        s if s.starts_with("0x") => Felt::from_hex(s)
            .map(BlockId::Hash)
            .map_err(|e| format!("invalid block hash '{}': {}", s, e)),
        s => s
            .parse()
            .map(BlockId::Number)
            .map_err(|e| format!("invalid block number '{}': {}", s, e)),
    }
}

/// Read-only access to a Starknet node.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Query a class by hash. Only an explicit not-found answer maps to
    /// [`ClassLookup::NotDeclared`]; every other failure is an error.
    async fn class_lookup(&self, class_hash: Felt) -> Result<ClassLookup, NetworkError>;

    async fn transaction_status(&self, tx_hash: Felt) -> Result<TransactionStatus, NetworkError>;

    async fn transaction_receipt(&self, tx_hash: Felt)
    -> Result<TransactionReceipt, NetworkError>;

    async fn events_page(
        &self,
        filter: &EventFilter,
        continuation_token: Option<&str>,
        chunk_size: u64,
    ) -> Result<EventsPage, NetworkError>;
}

/// A signing account able to submit transactions. Returned felts are transaction hashes.
#[async_trait]
pub trait ChainWriter: ChainReader {
    fn account_address(&self) -> Felt;

    async fn submit_declare(&self, artifact: &ContractArtifact) -> Result<Felt, NetworkError>;

    async fn submit_udc_deploy(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
        unique: bool,
    ) -> Result<Felt, NetworkError>;
}
