//! Polling a submitted transaction until it is accepted.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;

use crate::network::{ChainReader, NetworkError, TransactionReceipt, TxState};

/// Default interval between two status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settings of a [`TransactionWaiter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterConfig {
    /// Interval between two status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// States any of which counts as accepted.
    #[serde(default = "default_acceptance")]
    pub acceptance: Vec<TxState>,
    /// Give up after this many seconds. Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_acceptance() -> Vec<TxState> {
    vec![TxState::AcceptedOnL2, TxState::AcceptedOnL1]
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            acceptance: default_acceptance(),
            timeout_secs: None,
        }
    }
}

impl WaiterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Waits for transactions to reach one of the configured acceptance states.
///
/// Network errors met while polling are returned as-is, except "transaction not
/// found", which only means the node has not seen the transaction yet.
pub struct TransactionWaiter<'a, R: ?Sized> {
    reader: &'a R,
    config: WaiterConfig,
}

impl<'a, R> TransactionWaiter<'a, R>
where
    R: ChainReader + ?Sized,
{
    pub fn new(reader: &'a R, config: WaiterConfig) -> Self {
        Self { reader, config }
    }

    /// Poll until `tx_hash` is accepted, then return its receipt.
    pub async fn wait(&self, tx_hash: Felt) -> Result<TransactionReceipt, NetworkError> {
        let start = Instant::now();
        let interval = self.config.poll_interval();

        loop {
            match self.reader.transaction_status(tx_hash).await {
                Ok(status) => {
                    if let Some(failed) = status.states().find(TxState::is_failure) {
                        return Err(NetworkError::TransactionFailed {
                            tx_hash,
                            status: failed,
                            reason: self.failure_reason(tx_hash, failed).await,
                        });
                    }
                    if status.states().any(|s| self.config.acceptance.contains(&s)) {
                        tracing::debug!(
                            tx_hash = %format!("{:#x}", tx_hash),
                            finality = %status.finality_status,
                            "Transaction accepted"
                        );
                        return self.reader.transaction_receipt(tx_hash).await;
                    }
                    tracing::trace!(
                        tx_hash = %format!("{:#x}", tx_hash),
                        finality = %status.finality_status,
                        "Transaction not accepted yet"
                    );
                }
                Err(e) if e.is_tx_not_found() => {
                    tracing::trace!(
                        tx_hash = %format!("{:#x}", tx_hash),
                        "Transaction not known yet"
                    );
                }
                Err(e) => return Err(e),
            }

            if let Some(timeout) = self.config.timeout() {
                if start.elapsed() >= timeout {
                    return Err(NetworkError::Timeout {
                        tx_hash,
                        elapsed_secs: start.elapsed().as_secs(),
                    });
                }
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Status polls carry no reason. A reverted transaction has a receipt holding one.
    async fn failure_reason(&self, tx_hash: Felt, state: TxState) -> String {
        if state == TxState::Reverted {
            match self.reader.transaction_receipt(tx_hash).await {
                Ok(receipt) => {
                    if let Some(reason) = receipt.revert_reason {
                        return reason;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        tx_hash = %format!("{:#x}", tx_hash),
                        error = %e,
                        "Could not fetch receipt of reverted transaction"
                    );
                }
            }
        }
        "no reason given".to_string()
    }
}
